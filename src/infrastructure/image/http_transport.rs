//! HTTP transport for image bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::REFERER;
use tracing::debug;

use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::TransportPort;

/// Default user agent sent with image requests.
pub const DEFAULT_USER_AGENT: &str = concat!("resimage/", env!("CARGO_PKG_VERSION"));

/// `reqwest`-backed transport issuing plain GET requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(timeout: Duration, user_agent: &str) -> LoadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| LoadError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransportPort for HttpTransport {
    async fn fetch(&self, url: &str, referer: Option<&str>) -> LoadResult<Bytes> {
        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        debug!(url = %url, referer = ?referer, "Downloading image");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LoadError::network(format!("Request timed out: {e}"))
            } else {
                LoadError::network(format!("Request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(LoadError::network(format!(
                "HTTP {}: {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| LoadError::network(format!("Failed to read body: {e}")))
    }
}
