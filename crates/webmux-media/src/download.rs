//! Streamed HTTP retrieval of media URLs.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Fetches a remote resource into a local file.
#[async_trait]
pub trait StreamRetriever: Send + Sync {
    /// Stream `url` into `destination`, creating or truncating it.
    ///
    /// Returns the number of bytes written. Non-2xx responses, transport
    /// errors and local write errors all fail the retrieval.
    async fn fetch(&self, url: &str, destination: &Path) -> MediaResult<u64>;
}

/// Retriever over a shared `reqwest` client.
///
/// The timeout bounds the whole transfer, body included.
#[derive(Clone)]
pub struct HttpStreamRetriever {
    http: Client,
    timeout: Duration,
}

impl HttpStreamRetriever {
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MediaError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, timeout })
    }

    fn transport_error(&self, e: reqwest::Error) -> MediaError {
        if e.is_timeout() {
            MediaError::Timeout(self.timeout.as_secs())
        } else {
            MediaError::download_failed(e.to_string())
        }
    }
}

#[async_trait]
impl StreamRetriever for HttpStreamRetriever {
    async fn fetch(&self, url: &str, destination: &Path) -> MediaResult<u64> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::download_failed(format!(
                "server returned {}",
                status
            )));
        }

        let expected = response.content_length();
        let mut file = tokio::fs::File::create(destination).await?;
        let mut body = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if let Some(expected) = expected {
            if written != expected {
                return Err(MediaError::download_failed(format!(
                    "body truncated: received {} of {} bytes",
                    written, expected
                )));
            }
        }

        debug!(bytes = written, "Stored stream at {}", destination.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn retriever() -> HttpStreamRetriever {
        HttpStreamRetriever::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_body() {
        let server = MockServer::start().await;
        let body = vec![0x1a_u8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/audio.webm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("audio.webm");
        let written = retriever()
            .fetch(&format!("{}/audio.webm", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_truncates_existing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("video.webm");
        tokio::fs::write(&dest, b"stale contents from before").await.unwrap();

        retriever().fetch(&server.uri(), &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = retriever()
            .fetch(&server.uri(), &dir.path().join("video.webm"))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::DownloadFailed { .. }));
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_fetch_unwritable_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing").join("audio.webm");
        let err = retriever().fetch(&server.uri(), &dest).await.unwrap_err();

        assert!(matches!(err, MediaError::Io(_)));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let slow = HttpStreamRetriever::new(Duration::from_millis(200)).unwrap();
        let err = slow
            .fetch(&server.uri(), &dir.path().join("audio.webm"))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Timeout(_)));
    }
}
