use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{NavigatorError, Result};

/// A progress report for an in-flight transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 0..=100; 100 only once the whole stream has been read
    pub percent: u8,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Unbounded so a slow consumer can never hold the transfer back
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Turns byte counts into strictly increasing percentages
pub(crate) struct ProgressTracker<'a> {
    sender: Option<&'a ProgressSender>,
    total_bytes: u64,
    transferred: u64,
    last_percent: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sender: Option<&'a ProgressSender>, total_bytes: u64) -> Self {
        Self {
            sender,
            total_bytes,
            transferred: 0,
            last_percent: None,
        }
    }

    pub(crate) fn start(&mut self) {
        self.emit(0);
    }

    pub(crate) fn advance(&mut self, bytes: usize) {
        self.transferred += bytes as u64;
        let percent = if self.total_bytes == 0 {
            0
        } else {
            // Declared sizes can be wrong; hold at 99 until the stream ends
            (self.transferred.saturating_mul(100) / self.total_bytes).min(99) as u8
        };
        self.emit(percent);
    }

    pub(crate) fn finish(&mut self) {
        self.emit(100);
    }

    pub(crate) fn transferred(&self) -> u64 {
        self.transferred
    }

    fn emit(&mut self, percent: u8) {
        if self.last_percent.is_some_and(|last| percent <= last) {
            return;
        }
        self.last_percent = Some(percent);
        if let Some(sender) = self.sender {
            // A dropped receiver only means nobody is watching
            let _ = sender.send(ProgressEvent {
                percent,
                bytes_transferred: self.transferred,
                total_bytes: self.total_bytes,
            });
        }
    }
}

/// Read the whole stream in chunks, reporting progress after every chunk.
///
/// Fails with `Timeout` when a single read stalls past `stall_timeout` and with
/// `Cancelled` as soon as the token fires.
pub(crate) async fn transfer<R>(
    reader: &mut R,
    tracker: &mut ProgressTracker<'_>,
    chunk_size: usize,
    stall_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut data = Vec::with_capacity(tracker.total_bytes.min(64 * 1024 * 1024) as usize);
    let mut buf = vec![0u8; chunk_size.max(1)];

    tracker.start();
    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Transfer cancelled after {} bytes", tracker.transferred());
                return Err(NavigatorError::Cancelled);
            }
            read = tokio::time::timeout(stall_timeout, reader.read(&mut buf)) => read,
        };

        let n = match read {
            Ok(result) => result?,
            Err(_) => {
                warn!("Transfer stalled after {} bytes", tracker.transferred());
                return Err(NavigatorError::Timeout {
                    millis: stall_timeout.as_millis() as u64,
                });
            }
        };
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        tracker.advance(n);
    }
    tracker.finish();

    Ok(data)
}
