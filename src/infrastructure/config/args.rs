use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments of the `resimage` binary.
#[derive(Debug, Parser)]
#[command(
    name = "resimage",
    version,
    about = "Fetch, fit and round a remote image through the cached loading pipeline",
    long_about = None
)]
pub struct CliArgs {
    /// Image URL.
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Referer header sent with the request.
    #[arg(long, value_name = "URL")]
    pub referer: Option<String>,

    /// Bounding box as WIDTHxHEIGHT; non-positive sides are unconstrained.
    #[arg(long = "box", value_name = "WxH", value_parser = parse_box)]
    pub image_box: Option<(i32, i32)>,

    /// Corner radius in pixels.
    #[arg(long)]
    pub radius: Option<u32>,

    /// Bypass the memory cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Fade in the loaded image.
    #[arg(long)]
    pub fade_in: Option<bool>,

    /// Load the same URL this many times through one view.
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Write the final image to this PNG file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Memory cache ceiling in bytes.
    #[arg(long, value_name = "BYTES")]
    pub cache_bytes: Option<u64>,

    /// Request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}

fn parse_box(value: &str) -> Result<(i32, i32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{value}`"))?;
    let width = width
        .trim()
        .parse()
        .map_err(|e| format!("invalid width `{width}`: {e}"))?;
    let height = height
        .trim()
        .parse()
        .map_err(|e| format!("invalid height `{height}`: {e}"))?;
    Ok((width, height))
}
