// src/backup/s3_upload.rs
use anyhow::Context;
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use tracing::info;
use url::Url;

use crate::config::StorageConfig;
use crate::errors::{BackupError, Result};

/// Pushes a finished archive to object storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_length: i64,
        content_type: &str,
    ) -> Result<()>;
}

/// Uploader for S3-compatible object storage (AWS S3, MinIO, DigitalOcean Spaces).
#[derive(Debug, Clone)]
pub struct S3Uploader {
    client: s3::Client,
}

impl S3Uploader {
    /// Builds the client once at startup. Fails only if the endpoint is unusable.
    pub async fn new(storage_config: &StorageConfig) -> anyhow::Result<Self> {
        let endpoint_url = endpoint_url(&storage_config.endpoint, storage_config.use_ssl)?;

        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(endpoint_url.as_str().trim_end_matches('/'))
            .region(Region::new(storage_config.region.clone()))
            .retry_config(RetryConfig::disabled())
            .credentials_provider(s3::config::Credentials::new(
                &storage_config.access_key_id,
                &storage_config.secret_access_key,
                None, // session_token
                None, // expiry
                "Static", // provider_name
            ))
            .load()
            .await;

        // MinIO and most self-hosted stores do not serve virtual-hosted buckets.
        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!("Object storage client configured for endpoint {}", endpoint_url);
        Ok(Self {
            client: s3::Client::from_conf(s3_config),
        })
    }
}

#[async_trait]
impl ObjectUploader for S3Uploader {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_length: i64,
        content_type: &str,
    ) -> Result<()> {
        info!(
            "Uploading {} bytes to bucket {} with key {}",
            content_length, bucket, key
        );

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_length(content_length)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                BackupError::Upload(format!(
                    "Failed to upload s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }
}

/// Turns `host[:port]` or a full URL into the endpoint URL the SDK expects.
fn endpoint_url(endpoint: &str, use_ssl: bool) -> anyhow::Result<Url> {
    let endpoint = endpoint.trim();
    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        let scheme = if use_ssl { "https" } else { "http" };
        format!("{}://{}", scheme, endpoint)
    };

    let url = Url::parse(&with_scheme)
        .with_context(|| format!("Invalid S3 endpoint: {}", endpoint))?;
    if url.host_str().is_none() {
        anyhow::bail!("S3 endpoint has no host: {}", endpoint);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_endpoint_without_scheme_uses_ssl_flag() -> anyhow::Result<()> {
        assert_eq!(endpoint_url("minio:9000", false)?.as_str(), "http://minio:9000/");
        assert_eq!(endpoint_url("s3.example.com", true)?.as_str(), "https://s3.example.com/");
        Ok(())
    }

    #[test]
    fn test_endpoint_with_scheme_kept() -> anyhow::Result<()> {
        let url = endpoint_url("https://nyc3.digitaloceanspaces.com", false)?;
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("nyc3.digitaloceanspaces.com"));
        Ok(())
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(endpoint_url("http://", false).is_err());
        assert!(endpoint_url("bad host:port", false).is_err());
    }

    #[tokio::test]
    async fn test_client_builds_from_config() {
        let uploader = S3Uploader::new(&test_config().storage).await;
        assert!(uploader.is_ok());
    }

    #[tokio::test]
    async fn test_upload_transport_error_is_upload_error() {
        // Nothing listens on port 1, so the request fails in dispatch.
        let mut storage = test_config().storage;
        storage.endpoint = "127.0.0.1:1".to_string();
        let uploader = S3Uploader::new(&storage).await.unwrap();

        let result = uploader
            .upload("backups", "Database/2024/3/7/x.zip", b"PK".to_vec(), 2, "application/zip")
            .await;

        match result {
            Err(BackupError::Upload(msg)) => assert!(msg.contains("Database/2024/3/7/x.zip")),
            other => panic!("expected Upload error, got {:?}", other),
        }
    }
}
