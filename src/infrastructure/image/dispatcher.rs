//! Async fetch, decode and post-process orchestrator.
//!
//! Checks the memory cache first, then downloads on the runtime and decodes
//! on a blocking worker. Results go back to the requesting view as
//! [`LoadCompletion`] messages tagged with the request identity.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{ImageSource, LoadRequest, LoadedImage, RequestId};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{DecoderPort, TransportPort};
use crate::domain::services::ImagePipeline;

use super::codec::{DEFAULT_MAX_DECODE_BYTES, ImageCodec};
use super::http_transport::{DEFAULT_USER_AGENT, HttpTransport};
use super::memory_cache::{CacheStats, DEFAULT_CACHE_BYTES, ImageCache};

/// Message sent when a dispatched load finishes.
#[derive(Debug, Clone)]
pub struct LoadCompletion {
    /// Identity of the originating request.
    pub request_id: RequestId,
    /// The requested URL.
    pub url: String,
    /// The final image, or why there is none.
    pub result: Result<LoadedImage, LoadError>,
}

/// Configuration for the image dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Ceiling for cached pixel bytes.
    pub memory_cache_bytes: u64,
    /// Maximum concurrent downloads.
    pub max_concurrent_downloads: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// User agent for image requests.
    pub user_agent: String,
    /// Allocation ceiling for a single decode.
    pub max_decode_bytes: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            memory_cache_bytes: DEFAULT_CACHE_BYTES,
            max_concurrent_downloads: 4,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_decode_bytes: DEFAULT_MAX_DECODE_BYTES,
        }
    }
}

/// Loads images for any number of views.
///
/// Built once and shared between views; it owns the image cache and the
/// download throttle.
pub struct ImageDispatcher {
    handle: DispatcherHandle,
    semaphore: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    runtime: Handle,
    config: DispatcherConfig,
}

impl std::fmt::Debug for ImageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDispatcher")
            .field("config", &self.config)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl ImageDispatcher {
    /// Creates a dispatcher over the given collaborators.
    ///
    /// Background work is spawned on `runtime`, so `load` may be called
    /// from threads that are not part of it.
    #[must_use]
    pub fn new(
        config: DispatcherConfig,
        transport: Arc<dyn TransportPort>,
        decoder: Arc<dyn DecoderPort>,
        runtime: Handle,
    ) -> Self {
        let cache = Arc::new(ImageCache::for_images(config.memory_cache_bytes));
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));

        Self {
            handle: DispatcherHandle {
                cache,
                transport,
                decoder,
            },
            semaphore,
            pending: Arc::new(AtomicUsize::new(0)),
            runtime,
            config,
        }
    }

    /// Creates a dispatcher using HTTP and the bundled codec.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn from_config(config: DispatcherConfig, runtime: Handle) -> LoadResult<Self> {
        let transport = HttpTransport::new(
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )?;
        let decoder = ImageCodec::new(config.max_decode_bytes);
        Ok(Self::new(
            config,
            Arc::new(transport),
            Arc::new(decoder),
            runtime,
        ))
    }

    /// Replaces the cache, e.g. to share one between dispatchers or to
    /// observe evictions.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ImageCache>) -> Self {
        self.handle.cache = cache;
        self
    }

    /// Starts loading `request`; the outcome is posted to `reply`.
    ///
    /// A cache hit is posted before this returns and never touches the
    /// network. Identical concurrent requests are not merged.
    pub fn load(&self, request: &LoadRequest, reply: &mpsc::UnboundedSender<LoadCompletion>) {
        if let Some(loaded) = self.handle.cached(request) {
            Self::post(reply, request, Ok(loaded));
            return;
        }

        let guard = CompletionGuard::new(request.clone(), reply.clone(), self.pending.clone());
        let handle = self.handle.clone();
        let semaphore = self.semaphore.clone();

        self.runtime.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => handle.download(guard.request()).await,
                Err(e) => Err(LoadError::network(format!("Dispatcher shut down: {e}"))),
            };
            guard.complete(result);
        });
    }

    /// Loads `request` and waits for the result.
    ///
    /// # Errors
    /// Returns error if the image cannot be fetched, decoded or processed.
    pub async fn fetch(&self, request: &LoadRequest) -> LoadResult<LoadedImage> {
        if let Some(loaded) = self.handle.cached(request) {
            return Ok(loaded);
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| LoadError::network(format!("Dispatcher shut down: {e}")))?;
        self.handle.download(request).await
    }

    /// Returns the shared image cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<ImageCache> {
        &self.handle.cache
    }

    /// Returns memory cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.handle.cache.stats()
    }

    /// Evicts every cached image.
    pub fn clear_cache(&self) {
        self.handle.cache.clear();
        info!("Cleared image cache");
    }

    /// Returns the number of loads not yet completed.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Returns the configuration the dispatcher was built with.
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    fn post(
        reply: &mpsc::UnboundedSender<LoadCompletion>,
        request: &LoadRequest,
        result: LoadResult<LoadedImage>,
    ) {
        let completion = LoadCompletion {
            request_id: request.id,
            url: request.url.clone(),
            result,
        };
        if reply.send(completion).is_err() {
            trace!(request = %request.id, "Requesting view is gone, dropping completion");
        }
    }
}

/// Posts exactly one completion for a spawned load.
///
/// Dropped without [`Self::complete`] (the task panicked or the runtime
/// discarded it), it posts a network failure instead.
struct CompletionGuard {
    request: LoadRequest,
    reply: mpsc::UnboundedSender<LoadCompletion>,
    pending: Arc<AtomicUsize>,
    done: bool,
}

impl CompletionGuard {
    fn new(
        request: LoadRequest,
        reply: mpsc::UnboundedSender<LoadCompletion>,
        pending: Arc<AtomicUsize>,
    ) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self {
            request,
            reply,
            pending,
            done: false,
        }
    }

    const fn request(&self) -> &LoadRequest {
        &self.request
    }

    fn complete(mut self, result: LoadResult<LoadedImage>) {
        self.finish(result);
    }

    fn finish(&mut self, result: LoadResult<LoadedImage>) {
        if self.done {
            return;
        }
        self.done = true;
        ImageDispatcher::post(&self.reply, &self.request, result);
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.done {
            warn!(
                request = %self.request.id,
                url = %self.request.url,
                "Load task ended without a result"
            );
            self.finish(Err(LoadError::network("load task aborted")));
        }
    }
}

/// Cloneable state shared with background tasks.
#[derive(Clone)]
struct DispatcherHandle {
    cache: Arc<ImageCache>,
    transport: Arc<dyn TransportPort>,
    decoder: Arc<dyn DecoderPort>,
}

impl DispatcherHandle {
    fn cached(&self, request: &LoadRequest) -> Option<LoadedImage> {
        if request.bypass_cache {
            return None;
        }

        let id = request.cache_key();
        let image = self.cache.get(&id)?;
        trace!(id = %id, url = %request.url, "Memory cache hit");
        Some(LoadedImage {
            id,
            image,
            source: ImageSource::MemoryCache,
        })
    }

    async fn download(&self, request: &LoadRequest) -> LoadResult<LoadedImage> {
        let id = request.cache_key();
        debug!(id = %id, url = %request.url, "Downloading image from network");

        let bytes = self
            .transport
            .fetch(&request.url, request.referer.as_deref())
            .await
            .inspect_err(|e| warn!(url = %request.url, error = %e, "Download failed"))?;

        let decoder = self.decoder.clone();
        let (box_width, box_height, radius) =
            (request.box_width, request.box_height, request.corner_radius);

        let processed = tokio::task::spawn_blocking(move || -> LoadResult<_> {
            let decoded = decoder.decode(&bytes)?;
            Ok(ImagePipeline::process(&decoded, box_width, box_height, radius))
        })
        .await
        .map_err(|e| LoadError::decode(format!("Decode task panicked: {e}")))?
        .inspect_err(|e| warn!(url = %request.url, error = %e, "Decode failed"))?;

        let image = Arc::new(processed);
        if request.bypass_cache {
            trace!(id = %id, "Cache bypassed, not storing");
        } else {
            self.cache.put(id.clone(), image.clone());
        }

        debug!(
            id = %id,
            width = image.width(),
            height = image.height(),
            source = %ImageSource::Network,
            "Image loaded successfully"
        );

        Ok(LoadedImage {
            id,
            image,
            source: ImageSource::Network,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::entities::DecodedImage;
    use crate::domain::ports::mocks::{MockDecoderPort, MockTransport};

    const URL: &str = "http://x/img.png";

    fn png(width: u32, height: u32) -> Vec<u8> {
        DecodedImage::solid(width, height, [9, 8, 7, 255])
            .to_png_bytes()
            .expect("png encoding")
    }

    fn dispatcher(transport: Arc<MockTransport>) -> ImageDispatcher {
        ImageDispatcher::new(
            DispatcherConfig::default(),
            transport,
            Arc::new(ImageCodec::default()),
            Handle::current(),
        )
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<LoadCompletion>) -> LoadCompletion {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("completion in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_load_processes_and_caches() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(URL, png(400, 200));
        let dispatcher = dispatcher(transport.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let request = LoadRequest::new(URL).with_box(100, 100).with_corner_radius(10);
        dispatcher.load(&request, &tx);
        let completion = recv(&mut rx).await;

        assert_eq!(completion.request_id, request.id);
        let loaded = completion.result.expect("loaded");
        assert_eq!(loaded.source, ImageSource::Network);
        assert_eq!((loaded.image.width(), loaded.image.height()), (100, 50));
        assert_eq!(loaded.image.pixels().get_pixel(0, 0)[3], 0);
        assert!(dispatcher.cache().contains_key(&request.cache_key()));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(URL, png(10, 10));
        let dispatcher = dispatcher(transport.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher.load(&LoadRequest::new(URL), &tx);
        recv(&mut rx).await.result.expect("first load");

        let again = LoadRequest::new(URL);
        dispatcher.load(&again, &tx);
        let completion = rx.try_recv().expect("cache hit posted synchronously");

        assert_eq!(completion.request_id, again.id);
        assert_eq!(
            completion.result.expect("hit").source,
            ImageSource::MemoryCache
        );
        assert_eq!(transport.fetch_count(URL), 1);
        assert_eq!(dispatcher.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_different_box_is_a_separate_entry() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(URL, png(50, 50));
        let dispatcher = dispatcher(transport.clone());

        dispatcher.fetch(&LoadRequest::new(URL)).await.expect("plain");
        let small = dispatcher
            .fetch(&LoadRequest::new(URL).with_box(10, 10))
            .await
            .expect("small");

        assert_eq!(small.source, ImageSource::Network);
        assert_eq!(transport.fetch_count(URL), 2);
        assert_eq!(dispatcher.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_bypass_never_reads_or_writes_cache() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(URL, png(10, 10));
        let dispatcher = dispatcher(transport.clone());

        for _ in 0..2 {
            let loaded = dispatcher
                .fetch(&LoadRequest::new(URL).with_bypass_cache(true))
                .await
                .expect("loaded");
            assert_eq!(loaded.source, ImageSource::Network);
        }

        assert_eq!(transport.fetch_count(URL), 2);
        assert!(dispatcher.cache().is_empty());
        let stats = dispatcher.cache_stats();
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[tokio::test]
    async fn test_referer_is_forwarded() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(URL, png(4, 4));
        let dispatcher = dispatcher(transport.clone());

        dispatcher
            .fetch(&LoadRequest::new(URL).with_referer("http://x/page"))
            .await
            .expect("loaded");

        assert_eq!(
            transport.calls(),
            vec![(URL.to_string(), Some("http://x/page".to_string()))]
        );
    }

    struct PanickingTransport;

    #[async_trait::async_trait]
    impl TransportPort for PanickingTransport {
        async fn fetch(&self, _url: &str, _referer: Option<&str>) -> LoadResult<bytes::Bytes> {
            panic!("transport blew up");
        }
    }

    #[tokio::test]
    async fn test_transport_panic_still_posts_failure() {
        let dispatcher = ImageDispatcher::new(
            DispatcherConfig::default(),
            Arc::new(PanickingTransport),
            Arc::new(ImageCodec::default()),
            Handle::current(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = LoadRequest::new(URL);

        dispatcher.load(&request, &tx);
        let completion = recv(&mut rx).await;

        assert_eq!(completion.request_id, request.id);
        assert!(completion.result.unwrap_err().is_network_error());
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[test]
    fn test_load_on_stopped_runtime_posts_failure() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let handle = runtime.handle().clone();
        drop(runtime);

        let dispatcher = ImageDispatcher::new(
            DispatcherConfig::default(),
            Arc::new(MockTransport::new()),
            Arc::new(ImageCodec::default()),
            handle,
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher.load(&LoadRequest::new(URL), &tx);

        let completion = rx.try_recv().expect("failure posted synchronously");
        assert!(completion.result.is_err());
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_network_failure_is_posted() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(URL, LoadError::network("timeout"));
        let dispatcher = dispatcher(transport);
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher.load(&LoadRequest::new(URL), &tx);
        let err = recv(&mut rx).await.result.unwrap_err();

        assert_eq!(err, LoadError::network("timeout"));
        assert!(dispatcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_decode_failure_does_not_cache() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(URL, &b"not an image"[..]);
        let mut decoder = MockDecoderPort::new();
        decoder
            .expect_decode()
            .times(1)
            .returning(|_| Err(LoadError::memory("bitmap too large")));
        let dispatcher = ImageDispatcher::new(
            DispatcherConfig::default(),
            transport,
            Arc::new(decoder),
            Handle::current(),
        );

        let err = dispatcher.fetch(&LoadRequest::new(URL)).await.unwrap_err();
        assert!(err.is_decode_failure());
        assert!(dispatcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_skips_decoder() {
        let transport = Arc::new(MockTransport::new());
        let mut decoder = MockDecoderPort::new();
        decoder.expect_decode().never();
        let dispatcher = ImageDispatcher::new(
            DispatcherConfig::default(),
            transport,
            Arc::new(decoder),
            Handle::current(),
        );

        let err = dispatcher.fetch(&LoadRequest::new(URL)).await.unwrap_err();
        assert!(err.is_network_error());
    }

    #[tokio::test]
    async fn test_clear_cache_evicts_everything() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = dispatcher(transport);
        dispatcher.cache().put(
            LoadRequest::new(URL).cache_key(),
            Arc::new(DecodedImage::solid(2, 2, [0, 0, 0, 255])),
        );

        dispatcher.clear_cache();
        assert!(dispatcher.cache().is_empty());
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: DispatcherConfig = toml::from_str("max_concurrent_downloads = 2").expect("parse");
        assert_eq!(config.max_concurrent_downloads, 2);
        assert_eq!(config.memory_cache_bytes, DEFAULT_CACHE_BYTES);
        assert_eq!(config.timeout_secs, 30);
    }
}
