use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::downloader::Downloader;
use super::progress::ProgressReporter;
use crate::api::{ChatAction, ChatApi, DocumentUpload, Message, Update};
use crate::domain::{ChatError, DownloadRequest, RelayError, RelayPhase, StatusMessage};
use crate::utils::{file_name_for, normalize_link};

pub const WELCOME_TEXT: &str = "👋 <b>Welcome to the Downloader Bot!</b>\n\n\
    Send me a Google Drive or direct download link and I'll forward it to you as a file.";
pub const FALLBACK_TEXT: &str = "Send me a Google Drive or direct download link \
    and I'll forward it to you as a file.\n\nOr use /start to see the welcome message.";
pub const STARTING_TEXT: &str = "📥 Starting download…";
pub const UPLOADING_TEXT: &str = "📤 Uploading…";

/// What an inbound message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    Start,
    Link(&'a str),
    Fallback,
}

impl<'a> Route<'a> {
    pub fn of(message: &'a Message) -> Self {
        let Some(text) = message.text.as_deref() else {
            return Route::Fallback;
        };

        let command = text.split_whitespace().next().unwrap_or_default();
        if command == "/start" || command.starts_with("/start@") {
            Route::Start
        } else if text.starts_with("http") {
            Route::Link(text.trim())
        } else {
            Route::Fallback
        }
    }
}

/// Removes the local copy of a download when the request ends, however it ends.
struct Cleanup<'a>(&'a Path);

impl Drop for Cleanup<'_> {
    fn drop(&mut self) {
        // Failure means the file was never created or is already gone.
        if std::fs::remove_file(self.0).is_ok() {
            debug!("Removed {}", self.0.display());
        }
    }
}

/// Drives one inbound message through normalize, download, upload and cleanup.
#[derive(Clone)]
pub struct DownloadCoordinator {
    chat: Arc<dyn ChatApi>,
    downloader: Downloader,
    tmp_dir: PathBuf,
}

impl DownloadCoordinator {
    pub fn new(chat: Arc<dyn ChatApi>, downloader: Downloader, tmp_dir: PathBuf) -> Self {
        Self {
            chat,
            downloader,
            tmp_dir,
        }
    }

    /// Process one webhook update. Errors are chat calls that failed outside
    /// the download pipeline itself, e.g. the bot could not reply at all.
    pub async fn handle_update(&self, update: Update) -> Result<(), ChatError> {
        match update.message {
            Some(message) => {
                debug!(
                    "Update {} from user {:?} in {} chat {}",
                    update.update_id,
                    message.from.as_ref().map(|user| (user.id, user.username.as_deref())),
                    message.chat.kind,
                    message.chat.id
                );
                self.handle_message(&message).await
            }
            None => {
                debug!("Ignoring update {} without a message", update.update_id);
                Ok(())
            }
        }
    }

    pub async fn handle_message(&self, message: &Message) -> Result<(), ChatError> {
        let chat_id = message.chat.id;
        match Route::of(message) {
            Route::Start => {
                self.chat
                    .send_message(chat_id, WELCOME_TEXT, None)
                    .await?;
            }
            Route::Fallback => {
                self.chat
                    .send_message(chat_id, FALLBACK_TEXT, Some(message.message_id))
                    .await?;
            }
            Route::Link(text) => self.relay_link(message, text).await?,
        }
        Ok(())
    }

    /// Build the request for a link, or fail with [`RelayError::InvalidLink`].
    pub fn prepare_download(&self, text: &str) -> Result<DownloadRequest, RelayError> {
        debug!(phase = ?RelayPhase::Normalizing, "Normalizing {text}");
        let normalized_url = normalize_link(text);
        if normalized_url.is_empty() || !normalized_url.starts_with("http") {
            return Err(RelayError::InvalidLink);
        }

        let file_name = file_name_for(&normalized_url);
        let destination_path = self
            .tmp_dir
            .join(format!("{}-{}", uuid::Uuid::new_v4().simple(), file_name));

        Ok(DownloadRequest {
            source_url: text.to_string(),
            normalized_url,
            file_name,
            destination_path,
        })
    }

    async fn relay_link(&self, message: &Message, text: &str) -> Result<(), ChatError> {
        let chat_id = message.chat.id;
        debug!(phase = ?RelayPhase::Received, "Link from chat {chat_id}");

        let request = match self.prepare_download(text) {
            Ok(request) => request,
            Err(err) => {
                info!(phase = ?RelayPhase::Failed, "Rejected link from chat {chat_id}");
                self.chat
                    .send_message(chat_id, &err.to_string(), Some(message.message_id))
                    .await?;
                return Ok(());
            }
        };

        let _cleanup = Cleanup(&request.destination_path);
        let status = self
            .chat
            .send_message(chat_id, STARTING_TEXT, Some(message.message_id))
            .await?;

        match self.transfer(&request, &status, message).await {
            Ok(()) => {
                info!(
                    phase = ?RelayPhase::Done,
                    "Relayed {} to chat {chat_id}", request.file_name
                );
                Ok(())
            }
            Err(err) => {
                warn!(phase = ?RelayPhase::Failed, "Relay to chat {chat_id} failed: {err}");
                self.chat
                    .edit_message(&status, &html_escape::encode_text(&err.to_string()))
                    .await
            }
        }
    }

    async fn transfer(
        &self,
        request: &DownloadRequest,
        status: &StatusMessage,
        message: &Message,
    ) -> Result<(), RelayError> {
        info!(
            phase = ?RelayPhase::Downloading,
            "Downloading {} to {}",
            request.normalized_url,
            request.destination_path.display()
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::new(self.chat.as_ref(), status);
        let (downloaded, ()) = tokio::join!(
            self.downloader
                .download(&request.normalized_url, &request.destination_path, Some(tx)),
            reporter.run(rx),
        );
        let bytes = downloaded?;
        info!("Downloaded {bytes} bytes from {}", request.normalized_url);

        self.upload(request, status, message).await
    }

    async fn upload(
        &self,
        request: &DownloadRequest,
        status: &StatusMessage,
        message: &Message,
    ) -> Result<(), RelayError> {
        debug!(phase = ?RelayPhase::Uploading, "Uploading {}", request.file_name);
        if let Err(err) = self.chat.edit_message(status, UPLOADING_TEXT).await {
            warn!("Could not mark upload start: {err}");
        }

        let caption = format!(
            "✅ <b>Downloaded via:</b> <a href='{}'>link</a>",
            html_escape::encode_single_quoted_attribute(&request.source_url)
        );

        self.chat
            .send_chat_action(message.chat.id, ChatAction::UploadDocument)
            .await
            .map_err(RelayError::from_upload)?;
        self.chat
            .send_document(DocumentUpload {
                chat_id: message.chat.id,
                path: &request.destination_path,
                file_name: &request.file_name,
                caption: &caption,
                reply_to: message.message_id,
            })
            .await
            .map_err(RelayError::from_upload)
    }
}
