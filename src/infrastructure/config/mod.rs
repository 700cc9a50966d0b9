//! Application configuration.

/// Configuration file model.
pub mod app_config;
/// Command-line arguments.
pub mod args;
/// Loading and saving the configuration file.
pub mod storage;

pub use app_config::{AppConfig, LogLevel, ViewDefaults};
pub use args::CliArgs;
pub use storage::{ConfigError, StorageManager};
