pub mod error;
pub mod model;

pub use error::{ChatError, DownloadError, RelayError};
pub use model::{DownloadProgress, DownloadRequest, ProgressUpdate, RelayPhase, StatusMessage};
