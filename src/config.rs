use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::{Result, SpacedError};

/// Connection settings for the S3-compatible bucket.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: "minio".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            endpoint: String::new(),
            region: crate::DEFAULT_REGION.to_string(),
            bucket: String::new(),
            prefix: String::new(),
        }
    }
}

/// URL shortener backend and its free-form options (`token`, `endpoint`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShortenerConfig {
    pub kind: String,
    pub options: HashMap<String, String>,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            kind: "eokvin".to_string(),
            options: HashMap::new(),
        }
    }
}

impl ShortenerConfig {
    pub fn option(&self, name: &str) -> &str {
        self.options.get(name).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub monitor_path: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            monitor_path: crate::DEFAULT_MONITOR_PATH.to_string(),
        }
    }
}

/// External clipboard program. When `command` is unset the native clipboard is used.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        let command = if cfg!(target_os = "macos") {
            Some("pbcopy".to_string())
        } else {
            None
        };

        Self {
            command,
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpacedConfig {
    pub s3: StorageConfig,
    pub url: ShortenerConfig,
    pub fswatch: WatchConfig,
    pub clipboard: ClipboardConfig,
    #[serde(deserialize_with = "deserialize_share_ttl")]
    pub share_ttl: Duration,
    pub log_file: Option<PathBuf>,
}

impl Default for SpacedConfig {
    fn default() -> Self {
        Self {
            s3: StorageConfig::default(),
            url: ShortenerConfig::default(),
            fswatch: WatchConfig::default(),
            clipboard: ClipboardConfig::default(),
            share_ttl: Duration::from_secs(20 * 60),
            log_file: None,
        }
    }
}

/// Values given on the command line. Anything set here wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub monitor_path: Option<String>,
    pub log_file: Option<PathBuf>,
    pub token: Option<String>,
    pub shortener_endpoint: Option<String>,
    pub share_ttl: Option<Duration>,
    pub clipboard_command: Option<String>,
}

impl SpacedConfig {
    /// Loads the TOML config file, applies command line overrides and validates the result.
    ///
    /// An explicitly named file must exist. Without one, `config.toml` in the working
    /// directory is read if present.
    pub fn load(config_file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let (path, required) = match config_file {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(crate::DEFAULT_CONFIG_FILE), false),
        };

        debug!("Loading config from {} (required: {})", path.display(), required);

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_path()).required(required))
            .build()
            .map_err(|e| SpacedError::Config(format!("unable to decode config file: {e}")))?;

        let mut config: SpacedConfig = settings
            .try_deserialize()
            .map_err(|e| SpacedError::Config(format!("unable to decode config file: {e}")))?;

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            access_key,
            secret_key,
            endpoint,
            bucket,
            prefix,
            monitor_path,
            log_file,
            token,
            shortener_endpoint,
            share_ttl,
            clipboard_command,
        } = overrides;

        if let Some(v) = access_key {
            self.s3.access_key = v;
        }
        if let Some(v) = secret_key {
            self.s3.secret_key = v;
        }
        if let Some(v) = endpoint {
            self.s3.endpoint = v;
        }
        if let Some(v) = bucket {
            self.s3.bucket = v;
        }
        if let Some(v) = prefix {
            self.s3.prefix = v;
        }
        if let Some(v) = monitor_path {
            self.fswatch.monitor_path = v;
        }
        if let Some(v) = log_file {
            self.log_file = Some(v);
        }
        if let Some(v) = token {
            self.url.options.insert("token".to_string(), v);
        }
        if let Some(v) = shortener_endpoint {
            self.url.options.insert("endpoint".to_string(), v);
        }
        if let Some(v) = share_ttl {
            self.share_ttl = v;
        }
        if let Some(v) = clipboard_command {
            self.clipboard.command = Some(v);
        }

        // A blank log_file in the file means stdout.
        if self
            .log_file
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            self.log_file = None;
        }
    }

    /// Reports the first blank required field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("access-key", &self.s3.access_key),
            ("secret-key", &self.s3.secret_key),
            ("endpoint", &self.s3.endpoint),
            ("bucket", &self.s3.bucket),
            ("monitor-path", &self.fswatch.monitor_path),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SpacedError::Config(format!("{name} cannot be blank")));
            }
        }

        if self.url.option("token").trim().is_empty()
            || self.url.option("endpoint").trim().is_empty()
        {
            return Err(SpacedError::Config(
                "options 'token' and 'endpoint' are required".to_string(),
            ));
        }

        if self.share_ttl.is_zero() {
            return Err(SpacedError::Config(
                "share_ttl must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn monitor_path(&self) -> Result<PathBuf> {
        expand_tilde(&self.fswatch.monitor_path)
    }
}

fn deserialize_share_ttl<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Expands a leading `~` to the current user's home directory.
pub fn expand_tilde(path: &str) -> Result<PathBuf> {
    let rest = match path.strip_prefix('~') {
        Some(rest) => rest,
        None => return Ok(PathBuf::from(path)),
    };

    // `~user` is not supported
    if !rest.is_empty() && !rest.starts_with('/') {
        return Ok(PathBuf::from(path));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| SpacedError::Config("cannot expand ~: no home directory".to_string()))?;

    Ok(home.join(rest.trim_start_matches('/')))
}

/// Parses duration strings such as `20m`, `1h30m`, `1.5h` or `500ms`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || SpacedError::Config(format!("invalid duration {input:?}"));

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_end].parse().map_err(|_| invalid())?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "h" => 3_600e9,
            "m" => 60e9,
            "s" => 1e9,
            "ms" => 1e6,
            "us" | "µs" => 1e3,
            "ns" => 1.0,
            "" => {
                return Err(SpacedError::Config(format!(
                    "missing unit in duration {input:?}"
                )))
            }
            unit => {
                return Err(SpacedError::Config(format!(
                    "unknown unit {unit:?} in duration {input:?}"
                )))
            }
        };
        total_nanos += value * nanos_per_unit;
        rest = &rest[unit_end..];
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Formats a duration the way [`parse_duration`] reads it, e.g. `1h30m0s`,
/// `2.5s` or `1.5ms`. No precision is lost.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();

    if secs == 0 {
        return match nanos {
            0 => "0s".to_string(),
            n if n < 1_000 => format!("{n}ns"),
            n if n < 1_000_000 => {
                format!("{}µs", with_fraction(u64::from(n / 1_000), n % 1_000, 3))
            }
            n => format!("{}ms", with_fraction(u64::from(n / 1_000_000), n % 1_000_000, 6)),
        };
    }

    let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    let _ = write!(out, "{}s", with_fraction(seconds, nanos, 9));
    out
}

fn with_fraction(whole: u64, fraction: u32, digits: usize) -> String {
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{fraction:0digits$}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}
