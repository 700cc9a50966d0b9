//! Port definition for fetching raw image bytes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::LoadResult;

/// Port for retrieving the body behind a locator.
/// Implementations must be thread-safe; timeouts are their responsibility.
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Fetches the full response body for `url`, sending `referer` when given.
    async fn fetch(&self, url: &str, referer: Option<&str>) -> LoadResult<Bytes>;
}

/// Recording transport for tests.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::domain::errors::LoadError;

    /// Recording transport serving canned responses.
    #[derive(Default)]
    pub struct MockTransport {
        responses: Mutex<HashMap<String, Result<Bytes, LoadError>>>,
        delays: Mutex<HashMap<String, Duration>>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl MockTransport {
        /// Creates a transport with no routes; unknown URLs fail with 404.
        pub fn new() -> Self {
            Self::default()
        }

        /// Serves `body` for `url`.
        pub fn respond(&self, url: &str, body: impl Into<Bytes>) {
            self.responses
                .lock()
                .insert(url.to_string(), Ok(body.into()));
        }

        /// Fails every fetch of `url` with `error`.
        pub fn fail(&self, url: &str, error: LoadError) {
            self.responses.lock().insert(url.to_string(), Err(error));
        }

        /// Holds fetches of `url` for `delay` before answering.
        pub fn delay(&self, url: &str, delay: Duration) {
            self.delays.lock().insert(url.to_string(), delay);
        }

        /// Number of fetches issued for `url`.
        pub fn fetch_count(&self, url: &str) -> usize {
            self.calls.lock().iter().filter(|(u, _)| u == url).count()
        }

        /// Every `(url, referer)` pair fetched so far.
        pub fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl TransportPort for MockTransport {
        async fn fetch(&self, url: &str, referer: Option<&str>) -> LoadResult<Bytes> {
            self.calls
                .lock()
                .push((url.to_string(), referer.map(String::from)));

            let delay = self.delays.lock().get(url).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.responses
                .lock()
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(LoadError::network("HTTP 404 Not Found")))
        }
    }
}
