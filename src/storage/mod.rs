use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ObjectStoreExt, PutPayload};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;
use url::Url;

use crate::{config::StorageConfig, Result, SpacedError};

/// Remote bucket the pipeline uploads into.
///
/// Keys are final: implementations store and sign exactly the key they are given.
/// Calling either method again for the same key overwrites or re-signs it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads the file at `local_path` under `key` and returns the number of bytes stored.
    async fn put(&self, key: &str, local_path: &Path) -> Result<u64>;

    /// Mints a GET URL for `key` that stays valid for `ttl`.
    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<Url>;
}

/// Joins the configured prefix and a base file name into a storage key.
///
/// An empty prefix yields the bare name; redundant slashes at the seam are dropped.
pub fn object_key(prefix: &str, base_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        base_name.to_string()
    } else {
        format!("{prefix}/{base_name}")
    }
}

/// S3-compatible storage (DigitalOcean Spaces, MinIO, AWS).
pub struct S3ObjectStore {
    store: AmazonS3,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        if config.kind != "minio" {
            return Err(SpacedError::Config(format!(
                "unsupported S3 kind: {}",
                config.kind
            )));
        }

        let endpoint = normalize_endpoint(&config.endpoint);
        let allow_http = endpoint.starts_with("http://");

        let store = AmazonS3Builder::new()
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_region(&config.region)
            .with_bucket_name(&config.bucket)
            .with_endpoint(endpoint)
            .with_allow_http(allow_http)
            .build()
            .map_err(|e| SpacedError::Config(e.to_string()))?;

        Ok(Self {
            store,
            bucket: config.bucket.clone(),
        })
    }
}

/// Endpoints are often given as a bare host (`nyc3.digitaloceanspaces.com`).
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, local_path: &Path) -> Result<u64> {
        let data = fs::read(local_path).await?;
        let size = data.len() as u64;
        let location = ObjectPath::from(key);
        let start = Instant::now();

        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| {
                tracing::debug!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                SpacedError::Storage(e.to_string())
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(size)
    }

    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<Url> {
        let location = ObjectPath::from(key);

        self.store
            .signed_url(Method::GET, &location, ttl)
            .await
            .map_err(|e| SpacedError::Storage(e.to_string()))
    }
}
