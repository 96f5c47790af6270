use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use corban_navigator::app::{NavigatorSession, ReportFormat, ReportRequest, ReportTemplate, ViewState};
use corban_navigator::config::NavigatorConfig;
use corban_navigator::domain::{format_local_date, ContractStatus};
use corban_navigator::infra::JsonFileReportSink;
use corban_navigator::logging;
use corban_navigator::observability::metrics;
use corban_navigator::pipeline::ingestion::{mapper, progress_channel};
use corban_navigator::pipeline::processing::query::{DateRange, SortDirection, SortField, SortSpec};
use corban_navigator::pipeline::processing::CheckStatus;
use corban_navigator::progress;

#[derive(Parser)]
#[command(name = "corban_navigator")]
#[command(about = "Explore, validate and report on correspondent-banking contract spreadsheets")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (defaults to $CORBAN_CONFIG or corban.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print a Prometheus metrics snapshot when the command finishes
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a workbook and print the parsed-file summary
    Ingest {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Search, filter and page through the records of a workbook
    Explore {
        file: PathBuf,
        /// Case-insensitive text matched against id, consultant and bank
        #[arg(long)]
        search: Option<String>,
        /// Status (Cadastrado/Averbado/Pago/Cancelado or English)
        #[arg(long, value_parser = parse_status)]
        status: Option<ContractStatus>,
        #[arg(long)]
        bank: Option<String>,
        /// Registration date lower bound (DD/MM/YYYY or YYYY-MM-DD)
        #[arg(long, value_parser = parse_cli_date)]
        from: Option<NaiveDate>,
        /// Registration date upper bound (DD/MM/YYYY or YYYY-MM-DD)
        #[arg(long, value_parser = parse_cli_date)]
        to: Option<NaiveDate>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
        /// Sort field: id, registered_at, bank, consultant, status, outstanding_balance,
        /// commission_expected, commission_received, paid_at
        #[arg(long, value_parser = parse_sort_field)]
        sort: Option<SortField>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        json: bool,
    },
    /// Run the quality checks over a workbook
    Quality {
        file: PathBuf,
        /// Write the full report as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Portfolio KPIs plus bank and consultant insights
    Summary {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Build a report and write it through the JSON report sink
    Report {
        file: PathBuf,
        /// executive, detailed or quality
        #[arg(long)]
        template: ReportTemplate,
        /// json, pdf or excel
        #[arg(long, default_value = "json")]
        format: ReportFormat,
        #[arg(long, value_parser = parse_cli_date)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_cli_date)]
        to: Option<NaiveDate>,
        #[arg(long)]
        output: PathBuf,
    },
}

fn parse_status(s: &str) -> Result<ContractStatus, String> {
    s.parse()
}

fn parse_cli_date(s: &str) -> Result<NaiveDate, String> {
    mapper::parse_date(s)
        .map(|(date, _)| date)
        .ok_or_else(|| format!("invalid date '{}' (expected DD/MM/YYYY or YYYY-MM-DD)", s))
}

fn parse_sort_field(s: &str) -> Result<SortField, String> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase()))
        .map_err(|_| format!("unknown sort field '{}'", s))
}

fn load_config(path: Option<&str>) -> Result<NavigatorConfig> {
    match path {
        Some(path) => NavigatorConfig::from_file(path).with_context(|| format!("Failed to load config from {}", path)),
        None => NavigatorConfig::load().context("Failed to load configuration"),
    }
}

/// Ingest with a byte progress bar on stderr
async fn load(session: &NavigatorSession, file: &Path) -> Result<()> {
    let size = tokio::fs::metadata(file).await.map(|m| m.len()).unwrap_or(0);
    let bar = progress::create_upload_progress(size, &format!("⏳ Loading {}", file.display()));

    let (tx, mut rx) = progress_channel();
    let printer = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                progress::apply_event(&bar, &event);
            }
        })
    };

    let outcome = session.ingest_path(file, Some(&tx)).await;
    drop(tx);
    let _ = printer.await;
    bar.finish_and_clear();

    let result = outcome.with_context(|| format!("Failed to ingest {}", file.display()))?;
    info!("Loaded {} rows from {}", result.row_count, result.file_name);
    Ok(())
}

fn status_icon(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Success => "✅",
        CheckStatus::Warning => "⚠️ ",
        CheckStatus::Error => "❌",
    }
}

async fn run(cli: Cli, session: NavigatorSession) -> Result<()> {
    match cli.command {
        Commands::Ingest { file, json } => {
            load(&session, &file).await?;
            let set = session.records();
            let Some(result) = set.source.as_ref() else {
                anyhow::bail!("ingestion finished without a result");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(result)?);
            } else {
                println!("📄 {}", result.file_name);
                println!("   Size: {} bytes", result.size_bytes);
                println!("   Sheets: {}", result.sheet_count);
                println!("   Columns: {}", result.column_count);
                println!("   Rows: {}", result.row_count);
                println!("   Last modified: {}", result.last_modified.to_rfc3339());
                println!("   Run: {}", result.run_id);
            }
        }
        Commands::Explore {
            file,
            search,
            status,
            bank,
            from,
            to,
            page,
            page_size,
            sort,
            desc,
            json,
        } => {
            load(&session, &file).await?;
            let mut view: ViewState = session.initial_view();
            if let Some(size) = page_size {
                view.filters.page_size = size;
            }
            view.set_search(search.unwrap_or_default());
            view.set_status(status);
            view.set_bank(bank);
            view.set_date_range(DateRange::new(from, to));
            view.filters.sort = sort.map(|field| SortSpec {
                field,
                direction: if desc { SortDirection::Desc } else { SortDirection::Asc },
            });
            view.go_to_page(page);

            let result = session.explore(&view);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "🔎 {} matching records (page {} of {})",
                    result.total_matching,
                    result.page,
                    result.total_pages.max(1)
                );
                for record in &result.records {
                    println!(
                        "   {:<14} {:<10} {:<20} {:<20} {}",
                        record.id,
                        record.registered_at.map(format_local_date).unwrap_or_default(),
                        record.bank,
                        record.consultant,
                        record.status.map(|s| s.label_pt()).unwrap_or("-"),
                    );
                }
            }
        }
        Commands::Quality { file, output } => {
            load(&session, &file).await?;
            let report = session.quality();
            println!("🛡️  Overall score: {:.1}", report.overall_score);
            for check in &report.checks {
                println!(
                    "   {} {:<35} {:>6.1}  ({} issues)",
                    status_icon(check.status),
                    check.check_name,
                    check.score,
                    check.issue_count
                );
            }
            println!(
                "   Valid records: {} of {} ({:.1}%), critical: {}",
                report.valid_records, report.total_records, report.valid_ratio, report.critical_records
            );
            if let Some(path) = output {
                let body = serde_json::to_vec_pretty(&report)?;
                tokio::fs::write(&path, body)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("   Report written to {}", path.display());
            }
        }
        Commands::Summary { file, json } => {
            load(&session, &file).await?;
            let summary = session.summary();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("📊 {} contracts", summary.total_records);
                println!("   Outstanding balance: R$ {}", summary.total_outstanding_balance);
                println!("   Expected commission: R$ {}", summary.total_commission_expected);
                println!("   Received commission: R$ {}", summary.total_commission_received);
                for status in &summary.status_counts {
                    println!("   {:<12} {}", status.status.label_pt(), status.count);
                }
                println!("   Top-2 bank concentration: {:.1}%", summary.top_bank_concentration);
                for bank in &summary.banks {
                    let days = bank
                        .avg_days_to_payment
                        .map(|d| format!("{:.1} days", d))
                        .unwrap_or_else(|| "-".to_string());
                    println!("   🏦 {:<20} {:>5} contracts  {}", bank.bank, bank.volume, days);
                }
                for consultant in &summary.consultants {
                    println!(
                        "   👤 {:<20} {:>5} contracts  {:>5.1}% converted",
                        consultant.consultant, consultant.contracts, consultant.conversion_rate
                    );
                }
            }
        }
        Commands::Report {
            file,
            template,
            format,
            from,
            to,
            output,
        } => {
            load(&session, &file).await?;
            let request = ReportRequest {
                date_range: DateRange::new(from, to),
                ..ReportRequest::new(template, format)
            };
            let sink = Arc::new(JsonFileReportSink::new(output));
            let receipt = session.report(&request, sink).await?;
            println!("📝 Report written to {} ({} bytes)", receipt.location, receipt.bytes_written);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init_logging(&config.logging);
    if cli.metrics {
        metrics::init_metrics();
    }
    let show_metrics = cli.metrics;

    let session = NavigatorSession::new(config);
    let outcome = run(cli, session).await;

    if show_metrics {
        if let Some(snapshot) = metrics::render() {
            println!("\n{}", snapshot);
        }
    }

    if let Err(e) = &outcome {
        error!("Command failed: {:#}", e);
    }
    outcome
}
