// Pipeline ingestion: validation, chunked transfer with progress, workbook decoding and record mapping

pub mod mapper;
pub mod transfer;
pub mod workbook;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::IngestionConfig;
use crate::constants::is_supported_workbook;
use crate::error::{NavigatorError, Result};
use crate::observability::metrics;
use crate::pipeline::storage::RecordSet;

pub use transfer::{progress_channel, ProgressEvent, ProgressReceiver, ProgressSender};
pub use workbook::{DelimitedWorkbookParser, Sheet, Workbook, WorkbookParser};

use transfer::ProgressTracker;

/// A file offered for ingestion
pub struct CandidateFile<R> {
    pub name: String,
    /// Declared size, used as the progress denominator
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub content: R,
}

impl<R> CandidateFile<R> {
    pub fn new(name: impl Into<String>, size_bytes: u64, last_modified: DateTime<Utc>, content: R) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            last_modified,
            content,
        }
    }
}

impl CandidateFile<tokio::fs::File> {
    /// Open a file from disk, taking name, size and modification time from its metadata
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let file = tokio::fs::File::open(path).await?;
        let metadata = file.metadata().await?;
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Self::new(name, metadata.len(), last_modified, file))
    }
}

/// Summary of a completed ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub run_id: Uuid,
    pub file_name: String,
    /// Bytes actually transferred
    pub size_bytes: u64,
    pub sheet_count: usize,
    pub column_count: usize,
    pub row_count: usize,
    pub last_modified: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Parsed ingestion output that has not been committed anywhere yet
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    pub result: IngestionResult,
    pub records: RecordSet,
}

/// Validate → transfer → parse → map.
///
/// The pipeline itself never touches the record store; committing the outcome
/// is the caller's decision (see `IngestUseCase`).
pub struct IngestionPipeline {
    parser: Arc<dyn WorkbookParser>,
    chunk_size: usize,
    stall_timeout: Duration,
}

impl IngestionPipeline {
    /// Pipeline with the delimited-text workbook parser
    pub fn new(config: &IngestionConfig) -> Self {
        Self::with_parser(Arc::new(DelimitedWorkbookParser::new()), config)
    }

    pub fn with_parser(parser: Arc<dyn WorkbookParser>, config: &IngestionConfig) -> Self {
        Self {
            parser,
            chunk_size: config.chunk_size.max(1),
            stall_timeout: config.stall_timeout(),
        }
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    /// Reject anything that is not an .xlsx/.xls workbook
    pub fn validate(file_name: &str) -> Result<()> {
        if is_supported_workbook(file_name) {
            Ok(())
        } else {
            Err(NavigatorError::InvalidFormat {
                file_name: file_name.to_string(),
            })
        }
    }

    /// Run one ingestion attempt to completion, failure or cancellation
    pub async fn run<R>(
        &self,
        candidate: CandidateFile<R>,
        progress: Option<&ProgressSender>,
        cancel: &CancellationToken,
    ) -> Result<IngestionOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        // Validation happens before any progress is reported
        Self::validate(&candidate.name)?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("ingestion", run_id = %run_id, file = %candidate.name);
        metrics::ingestion::started();

        let outcome = self
            .run_validated(run_id, candidate, progress, cancel)
            .instrument(span)
            .await;
        if let Err(e) = &outcome {
            metrics::ingestion::failed(e.code());
        }
        outcome
    }

    async fn run_validated<R>(
        &self,
        run_id: Uuid,
        mut candidate: CandidateFile<R>,
        progress: Option<&ProgressSender>,
        cancel: &CancellationToken,
    ) -> Result<IngestionOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started = Instant::now();
        info!("Starting ingestion of {} ({} bytes declared)", candidate.name, candidate.size_bytes);

        let mut tracker = ProgressTracker::new(progress, candidate.size_bytes);
        let bytes = transfer::transfer(
            &mut candidate.content,
            &mut tracker,
            self.chunk_size,
            self.stall_timeout,
            cancel,
        )
        .await?;
        let size_bytes = bytes.len() as u64;

        let parser = Arc::clone(&self.parser);
        let (workbook, records) = tokio::task::spawn_blocking(move || -> Result<_> {
            let workbook = parser.parse(&bytes)?;
            let sheet = workbook
                .primary_sheet()
                .ok_or_else(|| NavigatorError::Parse("workbook has no sheets".to_string()))?;
            let records = mapper::map_sheet(sheet)?;
            Ok((workbook, records))
        })
        .await
        .map_err(|e| NavigatorError::Parse(format!("workbook decoding task failed: {}", e)))??;

        if cancel.is_cancelled() {
            warn!("Ingestion cancelled after parsing; discarding result");
            return Err(NavigatorError::Cancelled);
        }

        let schema = workbook
            .primary_sheet()
            .map(|sheet| {
                mapper::ColumnMapping::from_headers(&sheet.headers)
                    .map(|m| m.mapped_fields().map(|f| f.column_name().to_string()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        let result = IngestionResult {
            run_id,
            file_name: candidate.name,
            size_bytes,
            sheet_count: workbook.sheet_count(),
            column_count: workbook.column_count(),
            row_count: workbook.row_count(),
            last_modified: candidate.last_modified,
            completed_at: Utc::now(),
        };

        let elapsed = started.elapsed().as_secs_f64();
        metrics::ingestion::completed(size_bytes, records.len(), elapsed);
        info!(
            "Ingestion finished: {} sheet(s), {} columns, {} rows in {:.2}s",
            result.sheet_count, result.column_count, result.row_count, elapsed
        );

        Ok(IngestionOutcome {
            records: RecordSet {
                schema,
                records,
                source: Some(result.clone()),
            },
            result,
        })
    }
}
