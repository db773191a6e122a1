use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, bail};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use imgloader::application::{FetchImagesRequest, FetchImagesUseCase};
use imgloader::domain::Transform;
use imgloader::infrastructure::{AppConfig, CliArgs, ImageLoader, StorageManager};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

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
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = imgloader::VERSION, "Starting {}", imgloader::NAME);

    let (event_tx, _event_rx) = mpsc::unbounded_channel();
    let loader = ImageLoader::with_http(config.loader.clone(), &event_tx)?;
    let use_case = FetchImagesUseCase::new(loader.clone());

    let mut transforms = Vec::new();
    if args.circle {
        transforms.push(Transform::Circle);
    }
    if args.grayscale {
        transforms.push(Transform::Grayscale);
    }

    let request = FetchImagesRequest {
        urls: args.urls.clone(),
        cache_dir: config.effective_cache_dir(),
        resize: args.resize,
        transforms,
        output_dir: Some(config.effective_output_dir()),
        timeout: Duration::from_secs(config.wait_secs),
    };

    let response = use_case.execute(request).await;

    for outcome in &response.outcomes {
        match (&outcome.result, &outcome.output) {
            (Ok(loaded), Some(path)) => println!(
                "{} -> {} ({}x{}, {})",
                outcome.url,
                path.display(),
                loaded.width(),
                loaded.height(),
                loaded.source
            ),
            (Ok(loaded), None) => println!("{} loaded from {} but not written", outcome.url, loaded.source),
            (Err(e), _) => eprintln!("{}: {e}", outcome.url),
        }
    }

    info!(stats = %loader.memory_cache_stats(), "Memory cache");
    if let Some(size) = loader.disk_cache().current_size(&config.effective_cache_dir()).await {
        info!(bytes = size, "Disk cache");
    }

    let failed = response.failed();
    if failed > 0 {
        warn!(failed, "Some images could not be loaded");
        bail!("{failed} of {} images failed", response.outcomes.len());
    }

    Ok(())
}
