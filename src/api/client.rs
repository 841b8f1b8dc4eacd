use futures::Stream;
use futures::TryStreamExt;
use reqwest::Client;

use crate::domain::DownloadError;

pub type Result<T> = std::result::Result<T, DownloadError>;

/// HTTP access to the remote file being relayed.
///
/// Redirects are followed with reqwest's default policy. No request timeout
/// is configured: large or slow transfers are allowed to run as long as the
/// peer keeps the connection open.
#[derive(Clone, Default)]
pub struct SourceClient {
    http: Client,
}

impl SourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a GET and hand back (declared size, body stream).
    /// Any non-2xx status fails before the body is touched.
    pub async fn open_stream(
        &self,
        url: &str,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let total_size = response.content_length().filter(|len| *len > 0);
        let stream = response.bytes_stream().map_err(DownloadError::Request);

        Ok((total_size, stream))
    }
}
