use clap::Parser;
use spaced::{
    clipboard,
    config::{parse_duration, ConfigOverrides, SpacedConfig},
    daemon::{run_until_shutdown, shutdown_signal},
    pipeline::{PipelineConfig, StopReason, UploadPipeline},
    shortener::{EokvinShortener, UrlShortener},
    storage::{ObjectStore, S3ObjectStore},
    watch::DirectoryWatcher,
    Result,
};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command spaced automatically uploads screenshots and puts a shareable URL in
/// the system clipboard. The screenshots are uploaded to an S3-compatible bucket,
/// such as DigitalOcean Spaces, and eokvin is used as a URL shortening service.
#[derive(Parser)]
#[command(name = "spaced", version, author, verbatim_doc_comment)]
struct Cli {
    /// Access key (required)
    #[arg(long)]
    access_key: Option<String>,

    /// Secret key (required)
    #[arg(long)]
    secret_key: Option<String>,

    /// Endpoint URL (required)
    #[arg(long)]
    endpoint: Option<String>,

    /// Bucket name (required)
    #[arg(long)]
    bucket: Option<String>,

    /// Key prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Path to monitor [default: ~/Desktop]
    #[arg(long)]
    monitor_path: Option<String>,

    /// Log file path. If blank, logs print to stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Config file path [default: config.toml, optional]
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Secret token for eokvin service
    #[arg(long)]
    token: Option<String>,

    /// URL shortener service endpoint
    #[arg(long)]
    eokvin: Option<String>,

    /// How long share links stay valid, e.g. 20m or 1h30m [default: 20m]
    #[arg(long, value_parser = parse_ttl)]
    share_ttl: Option<Duration>,

    /// Clipboard program to pipe the short URL into, e.g. pbcopy or wl-copy
    #[arg(long)]
    clipboard_command: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            endpoint: self.endpoint.clone(),
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            monitor_path: self.monitor_path.clone(),
            log_file: self.log_file.clone(),
            token: self.token.clone(),
            shortener_endpoint: self.eokvin.clone(),
            share_ttl: self.share_ttl,
            clipboard_command: self.clipboard_command.clone(),
        }
    }
}

fn parse_ttl(raw: &str) -> std::result::Result<Duration, String> {
    parse_duration(raw).map_err(|e| e.to_string())
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    anyhow::anyhow!("unable to open {} for writing: {e}", path.display())
                })?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stdout_layer = if file_layer.is_none() {
        Some(tracing_subscriber::fmt::layer())
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spaced=info".into()),
        )
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(())
}

async fn start(config: SpacedConfig) -> Result<StopReason> {
    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(&config.s3)?);
    let shortener: Arc<dyn UrlShortener> = Arc::new(EokvinShortener::new(&config.url)?);
    let clipboard = clipboard::from_config(&config.clipboard)?;

    let monitor_path = config.monitor_path()?;
    let (watcher, streams) = DirectoryWatcher::open(&monitor_path)?;

    let pipeline = UploadPipeline::new(
        PipelineConfig::from_config(&config),
        store,
        shortener,
        clipboard,
    );

    info!(
        "Sharing new screenshots from {} to bucket {}",
        watcher.path().display(),
        config.s3.bucket
    );

    let reason = run_until_shutdown(pipeline, streams, shutdown_signal()).await;

    if let Err(e) = watcher.close() {
        error!("{}", e);
    }

    reason
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = SpacedConfig::load(cli.config_file.as_deref(), cli.overrides())?;

    init_logging(config.log_file.as_deref())?;

    info!("Starting spaced...");

    match start(config).await {
        Ok(reason) => {
            info!("spaced stopped ({:?})", reason);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
