pub mod ingest_use_case;
pub mod ports;
pub mod report_use_case;
pub mod session;

pub use ingest_use_case::IngestUseCase;
pub use report_use_case::{ReportFormat, ReportRequest, ReportTemplate, ReportUseCase};
pub use session::{ActiveView, NavigatorSession, ViewState};
