//! Infrastructure layer with adapters for external services.

/// Application configuration.
pub mod config;
/// Image handling (caching, transport, decoding, dispatch).
pub mod image;

pub use config::{AppConfig, CliArgs, ConfigError, LogLevel, StorageManager, ViewDefaults};
pub use self::image::{
    BoundedCache, CacheStats, DispatcherConfig, HttpTransport, ImageCache, ImageCodec,
    ImageDispatcher, LoadCompletion, RemovalNotice,
};
