use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::app::ports::{ReportReceipt, ReportSink};
use crate::domain::Record;
use crate::error::NavigatorError;
use crate::observability::metrics;
use crate::pipeline::processing::quality::{QualityAnalyzer, QualityReport};
use crate::pipeline::processing::query::{DateRange, FilterSpec};
use crate::pipeline::processing::summary::{summarize, PortfolioSummary};
use crate::pipeline::storage::RecordSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTemplate {
    /// KPIs and insights for management
    Executive,
    /// Everything, including the matching records
    Detailed,
    /// Data quality diagnostics only
    Quality,
}

impl ReportTemplate {
    pub fn key(&self) -> &'static str {
        match self {
            ReportTemplate::Executive => "executive",
            ReportTemplate::Detailed => "detailed",
            ReportTemplate::Quality => "quality",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportTemplate::Executive => "Relatório Executivo",
            ReportTemplate::Detailed => "Relatório Detalhado",
            ReportTemplate::Quality => "Relatório de Qualidade",
        }
    }

    pub fn default_sections(&self) -> Vec<ReportSection> {
        match self {
            ReportTemplate::Executive => vec![ReportSection::Summary, ReportSection::Insights],
            ReportTemplate::Detailed => vec![
                ReportSection::Summary,
                ReportSection::Insights,
                ReportSection::Quality,
                ReportSection::Records,
            ],
            ReportTemplate::Quality => vec![ReportSection::Quality],
        }
    }
}

impl std::str::FromStr for ReportTemplate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "executive" | "executivo" => Ok(ReportTemplate::Executive),
            "detailed" | "detalhado" => Ok(ReportTemplate::Detailed),
            "quality" | "qualidade" => Ok(ReportTemplate::Quality),
            other => Err(format!("unknown report template '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Json,
    Pdf,
    Excel,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "xlsx",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "pdf" => Ok(ReportFormat::Pdf),
            "excel" | "xlsx" => Ok(ReportFormat::Excel),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    /// Totals and status breakdown
    Summary,
    /// Bank and consultant insights
    Insights,
    Quality,
    Records,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub template: ReportTemplate,
    pub format: ReportFormat,
    #[serde(default)]
    pub date_range: DateRange,
    /// Overrides the template's default sections
    #[serde(default)]
    pub sections: Option<Vec<ReportSection>>,
}

impl ReportRequest {
    pub fn new(template: ReportTemplate, format: ReportFormat) -> Self {
        Self {
            template,
            format,
            date_range: DateRange::default(),
            sections: None,
        }
    }

    pub fn sections(&self) -> Vec<ReportSection> {
        self.sections
            .clone()
            .unwrap_or_else(|| self.template.default_sections())
    }
}

/// Assembled report, ready for a sink to render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub id: Uuid,
    pub title: String,
    pub template: ReportTemplate,
    pub format: ReportFormat,
    pub generated_at: DateTime<Utc>,
    pub date_range: DateRange,
    pub sections: Vec<ReportSection>,
    pub source_file: Option<String>,
    /// Records inside the date range
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PortfolioSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
}

/// Assemble a report document from a record set
pub fn build_report(set: &RecordSet, request: &ReportRequest, analyzer: &QualityAnalyzer) -> ReportDocument {
    let filter = FilterSpec {
        date_range: request.date_range,
        ..FilterSpec::default()
    }
    .normalized();
    let records: Vec<Record> = set
        .records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();

    let sections = request.sections();
    let wants = |section: ReportSection| sections.contains(&section);

    let summary = (wants(ReportSection::Summary) || wants(ReportSection::Insights)).then(|| {
        let mut summary = summarize(&records);
        if !wants(ReportSection::Insights) {
            summary.banks.clear();
            summary.consultants.clear();
        }
        summary
    });
    let quality = wants(ReportSection::Quality).then(|| analyzer.analyze(&records));
    let record_count = records.len();
    let records = wants(ReportSection::Records).then_some(records);

    ReportDocument {
        id: Uuid::new_v4(),
        title: request.template.title().to_string(),
        template: request.template,
        format: request.format,
        generated_at: Utc::now(),
        date_range: filter.date_range,
        sections: sections.clone(),
        source_file: set.source.as_ref().map(|s| s.file_name.clone()),
        record_count,
        summary,
        quality,
        records,
    }
}

/// Builds reports and hands them to a sink
pub struct ReportUseCase {
    analyzer: Arc<QualityAnalyzer>,
    sink: Arc<dyn ReportSink>,
}

impl ReportUseCase {
    pub fn new(analyzer: Arc<QualityAnalyzer>, sink: Arc<dyn ReportSink>) -> Self {
        Self { analyzer, sink }
    }

    pub async fn generate(&self, set: &RecordSet, request: &ReportRequest) -> Result<ReportReceipt> {
        if !self.sink.supports(request.format) {
            return Err(NavigatorError::Unsupported(format!(
                "{} output is not available from this report sink",
                request.format
            ))
            .into());
        }

        let document = build_report(set, request, &self.analyzer);
        let receipt = self
            .sink
            .deliver(&document)
            .await
            .with_context(|| format!("Failed to deliver {} report", request.template.key()))?;

        metrics::report::generated(request.template.key());
        info!(
            "Generated {} report ({} records) at {}",
            request.template.key(),
            document.record_count,
            receipt.location
        );
        Ok(receipt)
    }
}
