//! S3-compatible backend (AWS S3, MinIO, ...).

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client;

use super::{ByteReader, ObjectStat, ObjectStore, StorageError};
use crate::config::StorageConfig;

/// Object store backed by an `aws-sdk-s3` client.
///
/// Constructed once at startup and shared; the SDK client pools its own
/// connections.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Wrap an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from storage configuration.
    ///
    /// Explicit credentials and endpoint take precedence; anything left unset
    /// or empty falls back to the default AWS provider chain.
    pub async fn connect(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        if let (Some(access_key), Some(secret_key)) =
            (non_empty(&config.access_key), non_empty(&config.secret_key))
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "vidserve",
            ));
        }

        if let Some(endpoint) = non_empty(&config.endpoint) {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();

        tracing::debug!(
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            region = %config.region,
            path_style = config.path_style,
            "Configured S3 client"
        );

        Self::new(Client::from_conf(s3_config))
    }
}

/// Render an inclusive HTTP range for `[offset, offset + length)`.
fn range_header(offset: u64, length: u64) -> String {
    format!("bytes={}-{}", offset, offset + length - 1)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat, StorageError> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    StorageError::not_found(bucket, key)
                } else {
                    StorageError::Backend(format!("HeadObject {bucket}/{key}: {e}"))
                }
            })?;

        let size = head
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .ok_or_else(|| {
                StorageError::Backend(format!("HeadObject {bucket}/{key}: missing content-length"))
            })?;

        Ok(ObjectStat { size })
    }

    async fn open_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ByteReader, StorageError> {
        if length == 0 {
            return Ok(Box::new(tokio::io::empty()));
        }

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(range_header(offset, length))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::not_found(bucket, key)
                } else {
                    StorageError::Backend(format!("GetObject {bucket}/{key}: {e}"))
                }
            })?;

        Ok(Box::new(Box::pin(output.body.into_async_read())))
    }
}
