//! Invidious HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use webmux_models::VideoId;

use crate::error::{LocatorError, LocatorResult};
use crate::types::{select_streams, ResolvedMedia, VideoDetails};

/// Default public Invidious instance.
pub const DEFAULT_INSTANCE_URL: &str = "https://invidious.nikkosphere.com";

/// Resolves a video id to a compatible audio/video stream pair.
///
/// A single attempt is made; any failure is terminal for the job.
#[async_trait]
pub trait MediaLocator: Send + Sync {
    async fn resolve(&self, video_id: &VideoId) -> LocatorResult<ResolvedMedia>;
}

/// Configuration for the Invidious client.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Base URL of the Invidious instance
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INSTANCE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl LocatorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("INVIDIOUS_INSTANCE_URL")
                .unwrap_or_else(|_| DEFAULT_INSTANCE_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("LOCATOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// Client for the Invidious video metadata API.
pub struct InvidiousClient {
    http: Client,
    config: LocatorConfig,
}

impl InvidiousClient {
    /// Create a new client.
    pub fn new(config: LocatorConfig) -> LocatorResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(LocatorError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> LocatorResult<Self> {
        Self::new(LocatorConfig::from_env())
    }

    fn video_url(&self, video_id: &VideoId) -> String {
        format!(
            "{}/api/v1/videos/{}",
            self.config.base_url.trim_end_matches('/'),
            video_id
        )
    }

    /// Fetch raw video details.
    pub async fn video_details(&self, video_id: &VideoId) -> LocatorResult<VideoDetails> {
        let url = self.video_url(video_id);
        debug!("Looking up video metadata at {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(video_id = %video_id, %status, "Metadata lookup returned an error status");
            return Err(LocatorError::RequestFailed(format!(
                "metadata service returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| LocatorError::InvalidResponse(e.to_string()))
    }

    /// The client timeout covers the body too, so both reads map here.
    fn transport_error(&self, e: reqwest::Error) -> LocatorError {
        if e.is_timeout() {
            LocatorError::Timeout(self.config.timeout.as_secs())
        } else {
            LocatorError::Network(e)
        }
    }
}

#[async_trait]
impl MediaLocator for InvidiousClient {
    async fn resolve(&self, video_id: &VideoId) -> LocatorResult<ResolvedMedia> {
        let details = self.video_details(video_id).await?;
        let media = select_streams(&details)?;
        debug!(video_id = %video_id, title = %media.title, "Resolved WebM stream pair");
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> InvidiousClient {
        InvidiousClient::new(LocatorConfig {
            base_url: format!("{}/", server.uri()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = LocatorConfig::default();
        assert_eq!(config.base_url, DEFAULT_INSTANCE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_resolve_selects_webm_pair() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/videos/abcdefghijk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Cool Video!",
                "lengthSeconds": 212,
                "adaptiveFormats": [
                    { "type": "audio/mp4; codecs=\"mp4a.40.2\"", "url": "https://cdn/a.m4a" },
                    { "type": "audio/webm; codecs=\"opus\"", "url": "https://cdn/a.webm" },
                    { "type": "video/webm; codecs=\"vp9\"", "url": "https://cdn/v.webm" }
                ]
            })))
            .mount(&server)
            .await;

        let media = client_for(&server)
            .resolve(&VideoId::from_trusted("abcdefghijk"))
            .await
            .unwrap();

        assert_eq!(media.audio_url, "https://cdn/a.webm");
        assert_eq!(media.video_url, "https://cdn/v.webm");
        assert_eq!(media.title, "Cool Video!");
    }

    #[tokio::test]
    async fn test_resolve_without_webm_formats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/videos/abcdefghijk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "No WebM",
                "adaptiveFormats": [
                    { "type": "video/mp4", "url": "https://cdn/v.mp4" }
                ]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .resolve(&VideoId::from_trusted("abcdefghijk"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_resolve_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/videos/abcdefghijk"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .resolve(&VideoId::from_trusted("abcdefghijk"))
            .await
            .unwrap_err();

        assert!(matches!(err, LocatorError::RequestFailed(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_resolve_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/videos/abcdefghijk"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "title": "late", "adaptiveFormats": [] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = InvidiousClient::new(LocatorConfig {
            base_url: server.uri(),
            timeout: Duration::from_millis(200),
        })
        .unwrap();
        let err = client
            .resolve(&VideoId::from_trusted("abcdefghijk"))
            .await
            .unwrap_err();

        assert!(matches!(err, LocatorError::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_resolve_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/videos/abcdefghijk"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .resolve(&VideoId::from_trusted("abcdefghijk"))
            .await
            .unwrap_err();

        assert!(matches!(err, LocatorError::InvalidResponse(_)));
    }
}
