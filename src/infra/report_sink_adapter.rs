use crate::app::ports::{ReportReceipt, ReportSink};
use crate::app::report_use_case::{ReportDocument, ReportFormat};
use crate::error::NavigatorError;
use std::path::{Path, PathBuf};
use tracing::info;

/// File-based implementation of ReportSink
/// Writes report documents as pretty-printed JSON
pub struct JsonFileReportSink {
    file_path: PathBuf,
}

impl JsonFileReportSink {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

#[async_trait::async_trait]
impl ReportSink for JsonFileReportSink {
    fn supports(&self, format: ReportFormat) -> bool {
        format == ReportFormat::Json
    }

    async fn deliver(&self, document: &ReportDocument) -> anyhow::Result<ReportReceipt> {
        if !self.supports(document.format) {
            return Err(NavigatorError::Unsupported(format!("{} rendering", document.format)).into());
        }

        if let Some(dir) = self.file_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let body = serde_json::to_vec_pretty(document)?;
        tokio::fs::write(&self.file_path, &body).await?;
        info!("Wrote report {} to {}", document.id, self.file_path.display());

        Ok(ReportReceipt {
            location: self.file_path.display().to_string(),
            format: document.format,
            bytes_written: body.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::report_use_case::{ReportSection, ReportTemplate};
    use crate::pipeline::processing::query::DateRange;
    use chrono::Utc;
    use uuid::Uuid;

    fn document(format: ReportFormat) -> ReportDocument {
        ReportDocument {
            id: Uuid::new_v4(),
            title: ReportTemplate::Quality.title().to_string(),
            template: ReportTemplate::Quality,
            format,
            generated_at: Utc::now(),
            date_range: DateRange::default(),
            sections: vec![ReportSection::Quality],
            source_file: Some("data.xlsx".to_string()),
            record_count: 0,
            summary: None,
            quality: None,
            records: None,
        }
    }

    #[tokio::test]
    async fn test_writes_json_into_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("quality.json");
        let sink = JsonFileReportSink::new(&path);

        let receipt = sink.deliver(&document(ReportFormat::Json)).await.unwrap();
        assert_eq!(receipt.format, ReportFormat::Json);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(receipt.bytes_written, written.len() as u64);
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["template"], "quality");
        assert_eq!(value["source_file"], "data.xlsx");
        assert!(value.get("records").is_none());
    }

    #[tokio::test]
    async fn test_pdf_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileReportSink::new(dir.path().join("out.pdf"));
        assert!(!sink.supports(ReportFormat::Pdf));
        let err = sink.deliver(&document(ReportFormat::Pdf)).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }
}
