use anyhow::Result;
use chrono::{NaiveDate, Utc};
use corban_navigator::app::{NavigatorSession, ReportFormat, ReportRequest, ReportTemplate};
use corban_navigator::config::NavigatorConfig;
use corban_navigator::domain::ContractStatus;
use corban_navigator::infra::JsonFileReportSink;
use corban_navigator::pipeline::ingestion::CandidateFile;
use corban_navigator::pipeline::processing::quality::{CheckKind, CheckStatus, IssueSeverity};
use corban_navigator::pipeline::processing::query::{DateRange, SortField, SortSpec};
use corban_navigator::NavigatorError;
use std::sync::Arc;
use tempfile::tempdir;

const CLEAN: &str = "id;data_cadastro;banco;consultor;status;saldo_devedor;comissao_prevista;comissao_recebida;data_pago\n\
CORB-000001;15/08/2024;Banco do Brasil;João Silva;Pago;45780.50;2289.03;2289.03;20/08/2024\n\
CORB-000002;16/08/2024;Caixa Econômica;Maria Santos;Averbado;32150.00;1607.50;0;\n\
CORB-000003;17/08/2024;Itaú;Pedro Costa;Cadastrado;18900.75;945.04;0;\n\
CORB-000004;18/08/2024;Bradesco;Ana Lima;Pago;27500.00;1375.00;1375.00;25/08/2024\n\
CORB-000005;19/08/2024;Santander;Carlos Oliveira;Cancelado;12000.00;600.00;0;\n\
CORB-000006;20/08/2024;Banco do Brasil;Maria Santos;Pago;30000.00;1500.00;1500.00;28/08/2024\n";

// Row 3 repeats an id, row 4 pays before registering, row 5 has an ISO date, no consultant and a typo in the amount
const DIRTY: &str = "id;data_cadastro;banco;consultor;status;saldo_devedor;comissao_prevista;comissao_recebida;data_pago\n\
CORB-000001;15/08/2024;Banco do Brasil;João Silva;Pago;45780.50;2289.03;2289.03;20/08/2024\n\
CORB-000001;16/08/2024;Caixa Econômica;Maria Santos;Averbado;32150.00;1607.50;0;\n\
CORB-000003;17/08/2024;Itaú;Pedro Costa;Pago;18900.75;945.04;945.04;10/08/2024\n\
CORB-000004;2024-08-18;Bradesco;;Cadastrado;27.5OO;1375.00;0;\n";

fn config() -> NavigatorConfig {
    let mut config = NavigatorConfig::default();
    config.quality.as_of = NaiveDate::from_ymd_opt(2024, 12, 31);
    config
}

async fn loaded(body: &'static str) -> Result<NavigatorSession> {
    let session = NavigatorSession::new(config());
    let candidate = CandidateFile::new("data.xlsx", body.len() as u64, Utc::now(), body.as_bytes());
    session.ingest(candidate, None).await?;
    Ok(session)
}

#[tokio::test]
async fn test_explorer_filters_and_paginates_ingested_records() -> Result<()> {
    let session = loaded(CLEAN).await?;

    let mut view = session.initial_view();
    view.filters.page_size = 2;
    view.set_status(Some(ContractStatus::Paid));
    let first = session.explore(&view);
    assert_eq!(first.total_matching, 3);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.records.len(), 2);

    view.go_to_page(2);
    let second = session.explore(&view);
    assert_eq!(second.records.len(), 1);
    assert_eq!(second.records[0].id, "CORB-000006");

    view.go_to_page(3);
    assert!(session.explore(&view).records.is_empty());

    view.reset_filters();
    view.set_search("maria");
    view.filters.sort = Some(SortSpec::desc(SortField::RegisteredAt));
    let maria = session.explore(&view);
    let ids: Vec<&str> = maria.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["CORB-000006", "CORB-000002"]);

    view.reset_filters();
    view.set_date_range(DateRange::new(NaiveDate::from_ymd_opt(2024, 8, 18), None));
    assert_eq!(session.explore(&view).total_matching, 3);
    Ok(())
}

#[tokio::test]
async fn test_clean_workbook_passes_every_check() -> Result<()> {
    let session = loaded(CLEAN).await?;
    let report = session.quality();

    assert_eq!(report.checks.len(), 9);
    for check in &report.checks {
        assert_eq!(check.status, CheckStatus::Success, "{} failed", check.check_name);
    }
    assert_eq!(report.total_issues, 0);
    assert_eq!(report.valid_records, 6);
    assert_eq!(report.critical_records, 0);
    Ok(())
}

#[tokio::test]
async fn test_dirty_workbook_surfaces_findings() -> Result<()> {
    let session = loaded(DIRTY).await?;
    let report = session.quality();

    let issues_of = |kind: CheckKind| {
        report
            .checks
            .iter()
            .find(|c| c.check == kind)
            .map(|c| c.issue_count)
            .unwrap_or_default()
    };
    assert_eq!(issues_of(CheckKind::DuplicateIds), 1);
    assert_eq!(issues_of(CheckKind::ChronologicalDates), 1);
    assert_eq!(issues_of(CheckKind::LocalDateFormat), 1);
    assert_eq!(issues_of(CheckKind::TypeConsistency), 1);
    assert_eq!(issues_of(CheckKind::RequiredFields), 1);

    let sum: usize = report.checks.iter().map(|c| c.issue_count).sum();
    assert_eq!(report.total_issues, sum);

    let mean = report.checks.iter().map(|c| c.score).sum::<f64>() / report.checks.len() as f64;
    assert!((report.overall_score - mean).abs() < 1e-9);

    let typo = report
        .issues
        .iter()
        .find(|i| i.check == CheckKind::TypeConsistency)
        .expect("type issue listed");
    assert_eq!(typo.column, "saldo_devedor");
    assert_eq!(typo.row_index, 5);
    assert_eq!(typo.offending_value, "27.5OO");
    // one bad cell out of 28 typed cells scores ~96.4, inside the warning band
    assert_eq!(typo.severity, IssueSeverity::Warning);

    assert_eq!(report.valid_records, 1);
    assert!(report.valid_ratio < 100.0);
    Ok(())
}

#[tokio::test]
async fn test_report_written_through_json_sink() -> Result<()> {
    let session = loaded(CLEAN).await?;
    let dir = tempdir()?;
    let path = dir.path().join("executivo.json");

    let request = ReportRequest::new(ReportTemplate::Executive, ReportFormat::Json);
    let receipt = session
        .report(&request, Arc::new(JsonFileReportSink::new(&path)))
        .await?;
    assert!(receipt.bytes_written > 0);

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(value["record_count"], 6);
    assert_eq!(value["summary"]["total_records"], 6);
    assert!(value.get("quality").is_none());

    let pdf = ReportRequest::new(ReportTemplate::Executive, ReportFormat::Pdf);
    let err = session
        .report(&pdf, Arc::new(JsonFileReportSink::new(dir.path().join("x.pdf"))))
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<NavigatorError>(), Some(NavigatorError::Unsupported(_))));
    Ok(())
}
