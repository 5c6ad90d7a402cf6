pub mod clipboard;
pub mod config;
pub mod daemon;
pub mod pipeline;
pub mod shortener;
pub mod storage;
pub mod watch;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpacedError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("URL shortener error: {0}")]
    Shortener(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("File operation error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpacedError>;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_MONITOR_PATH: &str = "~/Desktop";
pub const DEFAULT_SHARE_TTL: &str = "20m";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const SHARE_EXTENSION: &str = ".png";
/// chrono has no zone abbreviation, so the numeric offset stands in for it.
pub const EXPIRY_FORMAT: &str = "%b %d %H:%M %z";
