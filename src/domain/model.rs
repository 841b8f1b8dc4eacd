use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Minimum spacing between two progress events that carry the same percent.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// One relay job, built from an inbound link.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub source_url: String,
    pub normalized_url: String,
    /// Name shown to the user; deterministic per normalized URL.
    pub file_name: String,
    /// Where the bytes land on disk; unique per request.
    pub destination_path: PathBuf,
}

/// Handle to the status message that tracks a request in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub downloaded: u64,
    pub total: u64,
}

/// Per-download counters plus the throttle deciding when to emit a
/// [`ProgressUpdate`].
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Zero when the source did not declare a size.
    pub total: u64,
    pub last_percent: u8,
    pub last_reported_at: Option<Instant>,
}

impl DownloadProgress {
    pub fn new(total: u64) -> Self {
        Self {
            downloaded: 0,
            total,
            last_percent: 0,
            last_reported_at: None,
        }
    }

    /// Record `bytes` more and return an update if one is due.
    pub fn advance(&mut self, bytes: u64, now: Instant) -> Option<ProgressUpdate> {
        self.downloaded += bytes;
        if self.total == 0 {
            return None;
        }

        let percent = (u128::from(self.downloaded) * 100 / u128::from(self.total)).min(100) as u8;
        let interval_elapsed = self
            .last_reported_at
            .map_or(true, |at| now.duration_since(at) >= PROGRESS_INTERVAL);

        if percent == self.last_percent && !interval_elapsed {
            return None;
        }

        self.last_percent = percent;
        self.last_reported_at = Some(now);
        Some(ProgressUpdate {
            percent,
            downloaded: self.downloaded,
            total: self.total,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Received,
    Normalizing,
    Downloading,
    Uploading,
    Done,
    Failed,
}
