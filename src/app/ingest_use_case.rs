use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{NavigatorError, Result};
use crate::pipeline::ingestion::{CandidateFile, IngestionPipeline, IngestionResult, ProgressSender};
use crate::pipeline::storage::RecordStore;

/// Runs one upload at a time and commits its records to the store.
///
/// Starting an upload cancels the one in flight. A run commits only while it is
/// still the latest generation and its token has not fired; that check happens
/// under the store's write lock, so a superseded run can never overwrite a newer one.
pub struct IngestUseCase {
    pipeline: IngestionPipeline,
    store: Arc<RecordStore>,
    generation: AtomicU64,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl IngestUseCase {
    pub fn new(pipeline: IngestionPipeline, store: Arc<RecordStore>) -> Self {
        Self {
            pipeline,
            store,
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Cancel the upload in flight, if any. The store keeps its previous contents.
    pub fn cancel_current(&self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = in_flight.take() {
            info!("Cancelling in-flight ingestion");
            token.cancel();
        }
    }

    /// Whether an upload is currently running
    pub fn is_running(&self) -> bool {
        self.in_flight
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = in_flight.replace(token.clone()) {
            debug!("New upload supersedes the one in flight");
            previous.cancel();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (generation, token)
    }

    fn end(&self, generation: u64) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if self.generation.load(Ordering::SeqCst) == generation {
            *in_flight = None;
        }
    }

    /// Ingest a candidate file and, on success, replace the store's contents
    pub async fn ingest<R>(
        &self,
        candidate: CandidateFile<R>,
        progress: Option<&ProgressSender>,
    ) -> Result<IngestionResult>
    where
        R: AsyncRead + Unpin + Send,
    {
        // An invalid file never starts, so it must not cancel a valid upload
        IngestionPipeline::validate(&candidate.name)?;

        let (generation, token) = self.begin();
        let outcome = self.pipeline.run(candidate, progress, &token).await;
        self.end(generation);
        let outcome = outcome?;

        let mut current = self.store.write_guard();
        if token.is_cancelled() || self.generation.load(Ordering::SeqCst) != generation {
            warn!("Discarding result of superseded ingestion of {}", outcome.result.file_name);
            return Err(NavigatorError::Cancelled);
        }
        let rows = outcome.records.len();
        *current = Arc::new(outcome.records);
        drop(current);

        info!("Committed {} records from {}", rows, outcome.result.file_name);
        Ok(outcome.result)
    }

    /// Open a file from disk and ingest it
    pub async fn ingest_path(
        &self,
        path: impl AsRef<Path>,
        progress: Option<&ProgressSender>,
    ) -> Result<IngestionResult> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        IngestionPipeline::validate(name)?;
        let candidate = CandidateFile::open(path).await?;
        self.ingest(candidate, progress).await
    }
}
