//! Terminal progress for workbook uploads

use indicatif::{ProgressBar, ProgressStyle};

use crate::pipeline::ingestion::ProgressEvent;

/// Byte progress bar for an upload of `size` bytes
pub fn create_upload_progress(size: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({percent}%)")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Move the bar to the position reported by the transfer
pub fn apply_event(pb: &ProgressBar, event: &ProgressEvent) {
    // The declared size may be off; trust what the transfer reports
    if event.total_bytes > 0 && pb.length() != Some(event.total_bytes) {
        pb.set_length(event.total_bytes);
    }
    pb.set_position(event.bytes_transferred);
}
