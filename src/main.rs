use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, bail, eyre};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use resimage::domain::ViewState;
use resimage::infrastructure::{AppConfig, CliArgs, ImageDispatcher, StorageManager};
use resimage::presentation::{MemoryDisplayTarget, ResImageView, ViewOptions};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = match StorageManager::new() {
        Ok(storage) => storage.load_config(args.config.as_deref())?,
        Err(_) if args.config.is_some() => {
            StorageManager::with_dir(PathBuf::new()).load_config(args.config.as_deref())?
        }
        Err(e) => {
            warn!(error = %e, "No configuration directory, using defaults");
            AppConfig::default()
        }
    };
    config.merge_with_args(args);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = resimage::VERSION, "Starting {}", resimage::NAME);

    let Some(url) = args.url.clone() else {
        bail!("no image URL given; pass one as the first argument");
    };

    let dispatcher = Arc::new(ImageDispatcher::from_config(
        config.loader.clone(),
        Handle::current(),
    )?);

    let mut options = ViewOptions::from_defaults(url, &config.view);
    options.http_referer = args.referer.clone();
    let mut view = ResImageView::new(MemoryDisplayTarget::new(), dispatcher.clone(), options);

    for attempt in 1..=args.repeat.max(1) {
        view.load_image()?;
        let state = view.settle().await.clone();
        let stats = dispatcher.cache_stats();
        info!(
            attempt,
            state = ?state,
            hits = stats.hits,
            misses = stats.misses,
            cached_bytes = stats.weight,
            "Load finished"
        );

        if let ViewState::Failed(reason) = state {
            return Err(eyre!("image load failed: {reason}"));
        }
    }

    let image = view
        .displayed_image()
        .cloned()
        .ok_or_else(|| eyre!("view finished without an image"))?;
    println!(
        "{}x{} ({} bytes decoded)",
        image.width(),
        image.height(),
        image.byte_size()
    );

    if let Some(output) = &args.output {
        let png = image.to_png_bytes()?;
        tokio::fs::write(output, png).await?;
        info!(path = %output.display(), "Wrote image");
    }

    let outcome = view.release();
    debug!(?outcome, "Released view");

    Ok(())
}
