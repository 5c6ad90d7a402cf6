pub mod filter;

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    clipboard::ClipboardSink,
    config::SpacedConfig,
    shortener::UrlShortener,
    storage::{object_key, ObjectStore},
    watch::{ChangeEvent, WatchStreams},
};

pub use filter::{CandidateFile, Rejection};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub prefix: String,
    pub share_ttl: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &SpacedConfig) -> Self {
        Self {
            prefix: config.s3.prefix.clone(),
            share_ttl: config.share_ttl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Upload,
    Presign,
    Shorten,
    Clipboard,
}

/// What happened to a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(Rejection),
    Abandoned(Stage),
    /// A short URL was produced; `copied` is false when any clipboard step failed.
    Shared { short_url: Url, copied: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop token was cancelled by someone else.
    Requested,
    /// The watch error stream closed; the pipeline cancelled the token itself.
    WatchClosed,
}

/// Turns created screenshots into a short URL on the clipboard, one event at a time.
pub struct UploadPipeline {
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    shortener: Arc<dyn UrlShortener>,
    clipboard: Arc<dyn ClipboardSink>,
}

impl UploadPipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ObjectStore>,
        shortener: Arc<dyn UrlShortener>,
        clipboard: Arc<dyn ClipboardSink>,
    ) -> Self {
        Self {
            config,
            store,
            shortener,
            clipboard,
        }
    }

    /// Runs until `stop` is cancelled or the watch error stream closes.
    ///
    /// The stop token is only observed between events; an event that is being
    /// processed always runs to completion or abandonment first.
    pub async fn run(self, mut streams: WatchStreams, stop: CancellationToken) -> StopReason {
        info!(
            "Upload pipeline started (prefix: {:?}, share ttl: {:?})",
            self.config.prefix, self.config.share_ttl
        );

        let mut events_open = true;

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    info!("Upload pipeline stopping");
                    return StopReason::Requested;
                }
                event = streams.events.recv(), if events_open => match event {
                    Some(event) => {
                        self.handle_event(&event).await;
                    }
                    None => {
                        warn!("Watch event stream closed, no further files will be seen");
                        events_open = false;
                    }
                },
                err = streams.errors.recv() => match err {
                    Some(e) => error!("error: {}", e),
                    None => {
                        error!("Watch error stream closed, stopping upload pipeline");
                        stop.cancel();
                        return StopReason::WatchClosed;
                    }
                },
            }
        }
    }

    /// Filters one event and, for candidates, runs upload → presign → shorten → clipboard.
    pub async fn handle_event(&self, event: &ChangeEvent) -> Outcome {
        debug!("event: {:?}", event);

        let candidate = match filter::candidate(event) {
            Ok(candidate) => candidate,
            Err(rejection) => {
                debug!("Not uploading {} ({:?})", event.path.display(), rejection);
                return Outcome::Skipped(rejection);
            }
        };

        self.share(&candidate).await
    }

    async fn share(&self, candidate: &CandidateFile) -> Outcome {
        let ttl = self.config.share_ttl;
        let key = object_key(&self.config.prefix, &candidate.base_name);

        match self.store.put(&key, &candidate.path).await {
            Ok(size) => debug!("Uploaded {} ({} bytes)", key, size),
            Err(e) => {
                error!("error writing to storage: {}", e);
                return Outcome::Abandoned(Stage::Upload);
            }
        }

        let share_url = match self.store.presigned_get(&key, ttl).await {
            Ok(url) => url,
            Err(e) => {
                error!("error getting public aws url: {}", e);
                return Outcome::Abandoned(Stage::Presign);
            }
        };
        info!("AWS URL: {}", share_url);

        let short_url = match self.shortener.shorten(&share_url, ttl).await {
            Ok(url) => url,
            Err(e) => {
                error!("error getting short share url: {}", e);
                return Outcome::Abandoned(Stage::Shorten);
            }
        };
        info!("Share URL: {} (valid until {})", short_url, expiry(ttl));

        let copied = self.copy_to_clipboard(short_url.as_str()).await;
        Outcome::Shared { short_url, copied }
    }

    /// Every step after a successful open is attempted, so the sink is never left hanging.
    async fn copy_to_clipboard(&self, text: &str) -> bool {
        let mut session = match self.clipboard.open().await {
            Ok(session) => session,
            Err(e) => {
                error!("error opening clipboard: {}", e);
                return false;
            }
        };

        let mut copied = true;

        if let Err(e) = session.write(text).await {
            error!("error writing to clipboard: {}", e);
            copied = false;
        }
        if let Err(e) = session.close().await {
            error!("error closing clipboard: {}", e);
            copied = false;
        }
        if let Err(e) = session.wait().await {
            error!("clipboard command exited with error: {}", e);
            copied = false;
        }

        copied
    }
}

fn expiry(ttl: Duration) -> String {
    let now = Local::now();
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .map(|at| at.format(crate::EXPIRY_FORMAT).to_string())
        .unwrap_or_else(|| "the far future".to_string())
}
