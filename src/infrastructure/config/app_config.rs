//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::infrastructure::image::DispatcherConfig;

pub(crate) const APP_NAME: &str = "resimage";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Defaults applied to every view the host creates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewDefaults {
    /// Bounding box width, `<= 0` for unconstrained.
    pub box_width: i32,
    /// Bounding box height, `<= 0` for unconstrained.
    pub box_height: i32,
    /// Corner radius in pixels.
    pub corner_radius: u32,
    /// Never read from or write to the cache.
    pub no_cache: bool,
    /// Fade in loaded images.
    pub fade_in: bool,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Image dispatcher configuration.
    #[serde(default)]
    pub loader: DispatcherConfig,

    /// View defaults.
    #[serde(default)]
    pub view: ViewDefaults,
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some((width, height)) = args.image_box {
            self.view.box_width = width;
            self.view.box_height = height;
        }
        if let Some(radius) = args.radius {
            self.view.corner_radius = radius;
        }
        if args.no_cache {
            self.view.no_cache = true;
        }
        if let Some(fade_in) = args.fade_in {
            self.view.fade_in = fade_in;
        }
        if let Some(cache_bytes) = args.cache_bytes {
            self.loader.memory_cache_bytes = cache_bytes;
        }
        if let Some(timeout) = args.timeout_secs {
            self.loader.timeout_secs = timeout;
        }
    }

    /// Returns effective log path.
    ///
    /// Logging goes to stderr unless a path was configured.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone()
    }
}
