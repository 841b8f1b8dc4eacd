use std::time::Duration;

use thiserror::Error;

/// Failure while pulling a file from its source.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed outcome of a rejected Bot API call.
///
/// Produced only by `api::telegram::classify_api_error`, so callers never
/// look at raw error strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Too Many Requests: retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("{0}")]
    InvalidFileUrl(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Telegram API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("Telegram request failed: {0}")]
    Transport(String),
}

/// Terminal failure of a single relay request. The display text is what the
/// user sees in the chat.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("❌ Invalid link format. Please send a valid HTTP/HTTPS link.")]
    InvalidLink,

    #[error("❌ Download failed: HTTP {0}")]
    DownloadFailed(u16),

    #[error("❌ Unexpected error: {0}")]
    UnexpectedDownload(String),

    #[error("❌ Invalid file URL. The link may not point to a valid file.")]
    InvalidFileUrl,

    #[error("❌ Telegram error: {0}")]
    UploadRejected(String),

    #[error("❌ Upload failed: {0}")]
    UnexpectedUpload(String),
}

impl From<DownloadError> for RelayError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::Status(code) => RelayError::DownloadFailed(code),
            other => RelayError::UnexpectedDownload(other.to_string()),
        }
    }
}

impl RelayError {
    pub fn from_upload(err: ChatError) -> Self {
        match err {
            ChatError::InvalidFileUrl(_) => RelayError::InvalidFileUrl,
            ChatError::BadRequest(description) => RelayError::UploadRejected(description),
            other => RelayError::UnexpectedUpload(other.to_string()),
        }
    }
}
