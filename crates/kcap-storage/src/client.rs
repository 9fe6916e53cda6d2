//! S3 storage client implementation.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Split a storage URL into a `(bucket, key)` pair.
///
/// The scheme is ignored and arbitrary: it exists only so the URL parses
/// uniformly. `s3://captures/jobs/a/0.wacz` and `anything://captures/jobs/a/0.wacz`
/// name the same object.
pub fn parse_storage_url(url: &str) -> StorageResult<(String, String)> {
    let rest = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(|| StorageError::invalid_url(url))?;

    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() || key.is_empty() {
        return Err(StorageError::invalid_url(url));
    }
    Ok((bucket.to_string(), key.to_string()))
}

/// The boundary contract against the archive object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Delete the object a storage URL points at. Deleting an object that
    /// is already gone is a no-op at the store.
    async fn delete_object(&self, storage_url: &str) -> StorageResult<()>;

    /// Mint a presigned, time-limited download URL with the given download
    /// filename. The URL is computable before the object exists; content
    /// is only guaranteed once the owning job is Complete.
    async fn presign_download(&self, storage_url: &str, filename: &str) -> StorageResult<String>;
}

/// Configuration for the S3 storage client.
#[derive(Debug, Clone)]
pub struct S3StorageConfig {
    /// S3 API endpoint URL; empty for stock AWS.
    pub endpoint_url: Option<String>,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Region.
    pub region: String,
    /// Lifetime of presigned download URLs. Independent of job retention;
    /// a URL may expire before its object is reaped.
    pub presign_expiry: Duration,
    /// Per-operation timeout; a slow store is a failure, not a hang.
    pub request_timeout: Duration,
}

impl S3StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("AWS_ENDPOINT").ok().filter(|e| !e.is_empty()),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("AWS_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("AWS_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            presign_expiry: Duration::from_secs(
                std::env::var("PRESIGN_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            request_timeout: Duration::from_secs(
                std::env::var("STORAGE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    presign_expiry: Duration,
}

impl S3Storage {
    /// Create a new storage client from configuration.
    pub fn new(config: S3StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "kcap",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.request_timeout)
                    .build(),
            )
            .force_path_style(true);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            presign_expiry: config.presign_expiry,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3StorageConfig::from_env()?))
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn delete_object(&self, storage_url: &str) -> StorageResult<()> {
        let (bucket, key) = parse_storage_url(storage_url)?;
        debug!(%bucket, %key, "Deleting archive object");

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    async fn presign_download(&self, storage_url: &str, filename: &str) -> StorageResult<String> {
        let (bucket, key) = parse_storage_url(storage_url)?;

        let presign_config = PresigningConfig::expires_in(self.presign_expiry)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .response_content_disposition(format!("attachment; filename=\"{}\"", filename))
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}
