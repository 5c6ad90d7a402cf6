use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::{
    config::{format_duration, ShortenerConfig},
    Result, SpacedError,
};

/// Turns a long share URL into a short one that expires after `ttl`.
#[async_trait]
pub trait UrlShortener: Send + Sync {
    async fn shorten(&self, long_url: &Url, ttl: Duration) -> Result<Url>;
}

#[derive(Debug, Deserialize)]
struct ShortUrlResponse {
    #[serde(rename = "short-url")]
    short_url: String,
}

/// Client for an eokvin shortener instance.
pub struct EokvinShortener {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl EokvinShortener {
    pub fn new(config: &ShortenerConfig) -> Result<Self> {
        if config.kind != "eokvin" {
            return Err(SpacedError::Config(format!(
                "unsupported URL shortener kind {}",
                config.kind
            )));
        }

        let token = config.option("token");
        let endpoint = config.option("endpoint");
        if token.is_empty() || endpoint.is_empty() {
            return Err(SpacedError::Config(
                "options 'token' and 'endpoint' are required".to_string(),
            ));
        }

        let endpoint = Url::parse(endpoint)
            .map_err(|e| SpacedError::Config(format!("invalid shortener endpoint: {e}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl UrlShortener for EokvinShortener {
    async fn shorten(&self, long_url: &Url, ttl: Duration) -> Result<Url> {
        let ttl = format_duration(ttl);
        let form = [
            ("token", self.token.as_str()),
            ("url", long_url.as_str()),
            ("ttl", ttl.as_str()),
        ];

        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Shortener responded {}: {}", status, body);

        if !status.is_success() {
            return Err(SpacedError::Shortener(format!(
                "{}: {}",
                status,
                body.trim()
            )));
        }

        parse_short_url(&body)
    }
}

fn parse_short_url(body: &str) -> Result<Url> {
    let parsed: ShortUrlResponse = serde_json::from_str(body)?;
    Url::parse(&parsed.short_url)
        .map_err(|e| SpacedError::Shortener(format!("invalid short URL {:?}: {e}", parsed.short_url)))
}
