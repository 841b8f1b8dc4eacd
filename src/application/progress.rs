use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::api::ChatApi;
use crate::domain::{ChatError, ProgressUpdate, StatusMessage};

pub fn progress_text(percent: u8) -> String {
    format!("📥 Downloading… {percent}%")
}

/// Mirrors download progress into the status message. Best effort: a
/// failed edit is logged and dropped, never retried.
pub struct ProgressReporter<'a> {
    chat: &'a dyn ChatApi,
    status: &'a StatusMessage,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(chat: &'a dyn ChatApi, status: &'a StatusMessage) -> Self {
        Self { chat, status }
    }

    pub async fn report(&self, percent: u8) {
        match self.chat.edit_message(self.status, &progress_text(percent)).await {
            Ok(()) => {}
            Err(ChatError::RateLimited { retry_after }) => {
                debug!(
                    "Progress edit rate limited (retry after {}s), dropping {percent}%",
                    retry_after.as_secs()
                );
            }
            Err(err) => warn!("Progress edit failed, dropping {percent}%: {err}"),
        }
    }

    /// Consume updates until the sender side is dropped. A backlog that built
    /// up during a slow edit collapses to its newest entry.
    pub async fn run(&self, mut updates: UnboundedReceiver<ProgressUpdate>) {
        while let Some(mut update) = updates.recv().await {
            while let Ok(newer) = updates.try_recv() {
                update = newer;
            }
            debug!(
                "Download progress {}% ({}/{} bytes)",
                update.percent, update.downloaded, update.total
            );
            self.report(update.percent).await;
        }
    }
}
