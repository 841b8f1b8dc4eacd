use std::path::Path;
use std::time::Instant;

use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::api::SourceClient;
use crate::domain::{DownloadError, DownloadProgress, ProgressUpdate};

pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Streams a remote file to disk in fixed-size chunks.
#[derive(Clone)]
pub struct Downloader {
    source: SourceClient,
    chunk_size: usize,
}

impl Downloader {
    pub fn new(source: SourceClient, chunk_size: usize) -> Self {
        Self {
            source,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Download `url` into `dest`, truncating any existing file.
    ///
    /// When the source declares its size, throttled [`ProgressUpdate`]s are
    /// sent on `progress`; the sender is dropped when this returns. A file
    /// that failed mid-transfer is left on disk for the caller to remove.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<UnboundedSender<ProgressUpdate>>,
    ) -> Result<u64, DownloadError> {
        let (total, stream) = self.source.open_stream(url).await?;
        let mut stream = Box::pin(stream);

        let mut file = tokio::fs::File::create(dest).await?;
        let mut state = DownloadProgress::new(total.unwrap_or(0));
        let mut buffer = BytesMut::with_capacity(self.chunk_size);

        while let Some(frame) = stream.next().await {
            buffer.extend_from_slice(&frame?);
            while buffer.len() >= self.chunk_size {
                let chunk = buffer.split_to(self.chunk_size);
                write_chunk(&mut file, &chunk, &mut state, progress.as_ref()).await?;
            }
        }
        if !buffer.is_empty() {
            write_chunk(&mut file, &buffer, &mut state, progress.as_ref()).await?;
        }

        file.flush().await?;
        file.sync_all().await?;

        debug!("Wrote {} bytes to {}", state.downloaded, dest.display());
        Ok(state.downloaded)
    }
}

async fn write_chunk(
    file: &mut tokio::fs::File,
    chunk: &[u8],
    state: &mut DownloadProgress,
    progress: Option<&UnboundedSender<ProgressUpdate>>,
) -> Result<(), DownloadError> {
    file.write_all(chunk).await?;

    if let Some(update) = state.advance(chunk.len() as u64, Instant::now()) {
        if let Some(tx) = progress {
            // A closed receiver only means nobody is watching any more.
            let _ = tx.send(update);
        }
    }
    Ok(())
}
