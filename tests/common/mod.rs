#![allow(dead_code)]

use async_trait::async_trait;
use spaced::{
    clipboard::{ClipboardSession, ClipboardSink},
    pipeline::{PipelineConfig, UploadPipeline},
    shortener::UrlShortener,
    storage::ObjectStore,
    Result, SpacedError,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const SHORT_URL: &str = "https://eok.vin/abc123";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Put { key: String, path: PathBuf },
    Presign { key: String, ttl: Duration },
    Shorten { url: String, ttl: Duration },
    ClipOpen,
    ClipWrite(String),
    ClipClose,
    ClipWait,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Polls until at least `n` calls were recorded.
    pub async fn wait_for(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.len() < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {n} calls, got {:?}", self.calls()));
    }
}

/// Which stages should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub put: bool,
    pub presign: bool,
    pub shorten: bool,
    pub open: bool,
    pub write: bool,
    pub close: bool,
    pub wait: bool,
}

pub fn presigned_url(key: &str, ttl: Duration) -> String {
    format!(
        "https://veo.nyc3.digitaloceanspaces.com/{key}?X-Amz-Expires={}",
        ttl.as_secs()
    )
}

pub struct FakeStore {
    log: CallLog,
    failures: Failures,
    put_delay: Option<Duration>,
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn put(&self, key: &str, local_path: &Path) -> Result<u64> {
        self.log.push(Call::Put {
            key: key.to_string(),
            path: local_path.to_path_buf(),
        });
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failures.put {
            return Err(SpacedError::Storage("bucket unreachable".to_string()));
        }
        Ok(42)
    }

    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<Url> {
        self.log.push(Call::Presign {
            key: key.to_string(),
            ttl,
        });
        if self.failures.presign {
            return Err(SpacedError::Storage("signing failed".to_string()));
        }
        Ok(Url::parse(&presigned_url(key, ttl)).unwrap())
    }
}

pub struct FakeShortener {
    log: CallLog,
    failures: Failures,
}

#[async_trait]
impl UrlShortener for FakeShortener {
    async fn shorten(&self, long_url: &Url, ttl: Duration) -> Result<Url> {
        self.log.push(Call::Shorten {
            url: long_url.to_string(),
            ttl,
        });
        if self.failures.shorten {
            return Err(SpacedError::Shortener("401 Unauthorized".to_string()));
        }
        Ok(Url::parse(SHORT_URL).unwrap())
    }
}

pub struct FakeClipboard {
    log: CallLog,
    failures: Failures,
}

#[async_trait]
impl ClipboardSink for FakeClipboard {
    async fn open(&self) -> Result<Box<dyn ClipboardSession>> {
        self.log.push(Call::ClipOpen);
        if self.failures.open {
            return Err(SpacedError::Clipboard("pbcopy not found".to_string()));
        }
        Ok(Box::new(FakeSession {
            log: self.log.clone(),
            failures: self.failures,
        }))
    }
}

struct FakeSession {
    log: CallLog,
    failures: Failures,
}

#[async_trait]
impl ClipboardSession for FakeSession {
    async fn write(&mut self, text: &str) -> Result<()> {
        self.log.push(Call::ClipWrite(text.to_string()));
        if self.failures.write {
            return Err(SpacedError::Clipboard("broken pipe".to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.push(Call::ClipClose);
        if self.failures.close {
            return Err(SpacedError::Clipboard("close failed".to_string()));
        }
        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        self.log.push(Call::ClipWait);
        if self.failures.wait {
            return Err(SpacedError::Clipboard("pbcopy exited with 1".to_string()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub log: CallLog,
    pub pipeline: UploadPipeline,
}

impl Harness {
    pub fn new(prefix: &str, share_ttl: Duration, failures: Failures) -> Self {
        Self::with_put_delay(prefix, share_ttl, failures, None)
    }

    pub fn with_put_delay(
        prefix: &str,
        share_ttl: Duration,
        failures: Failures,
        put_delay: Option<Duration>,
    ) -> Self {
        let log = CallLog::default();
        let pipeline = UploadPipeline::new(
            PipelineConfig {
                prefix: prefix.to_string(),
                share_ttl,
            },
            Arc::new(FakeStore {
                log: log.clone(),
                failures,
                put_delay,
            }),
            Arc::new(FakeShortener {
                log: log.clone(),
                failures,
            }),
            Arc::new(FakeClipboard {
                log: log.clone(),
                failures,
            }),
        );

        Self { log, pipeline }
    }
}

/// The full call sequence for one successfully shared file.
pub fn success_calls(key: &str, path: &str, ttl: Duration) -> Vec<Call> {
    vec![
        Call::Put {
            key: key.to_string(),
            path: PathBuf::from(path),
        },
        Call::Presign {
            key: key.to_string(),
            ttl,
        },
        Call::Shorten {
            url: presigned_url(key, ttl),
            ttl,
        },
        Call::ClipOpen,
        Call::ClipWrite(SHORT_URL.to_string()),
        Call::ClipClose,
        Call::ClipWait,
    ]
}
