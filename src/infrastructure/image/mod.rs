//! Image handling infrastructure.
//!
//! This module provides:
//! - A cost-bounded LRU memory cache
//! - HTTP transport for image bytes
//! - Decoding via the `image` crate
//! - The async fetch dispatcher

/// Decoding via the `image` crate.
pub mod codec;
/// Fetch, decode and cache orchestration.
pub mod dispatcher;
/// HTTP transport.
pub mod http_transport;
/// Cost-bounded LRU cache.
pub mod memory_cache;

pub use codec::ImageCodec;
pub use dispatcher::{DispatcherConfig, ImageDispatcher, LoadCompletion};
pub use http_transport::HttpTransport;
pub use memory_cache::{BoundedCache, CacheStats, ImageCache, RemovalNotice};
