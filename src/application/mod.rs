pub mod download_coordinator;
pub mod downloader;
pub mod progress;
#[cfg(test)]
pub mod testing;

pub use download_coordinator::DownloadCoordinator;
pub use downloader::{Downloader, DEFAULT_CHUNK_SIZE};
