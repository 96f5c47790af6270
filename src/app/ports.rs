use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::report_use_case::{ReportDocument, ReportFormat};

/// Where a finished report ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportReceipt {
    pub location: String,
    pub format: ReportFormat,
    pub bytes_written: u64,
}

/// Opaque destination for rendered reports (file, PDF renderer, mailer, scheduler)
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Whether this sink can render the given format
    fn supports(&self, format: ReportFormat) -> bool;

    async fn deliver(&self, document: &ReportDocument) -> anyhow::Result<ReportReceipt>;
}
