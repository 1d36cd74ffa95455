//! Defines the object storage collaborator and its S3
//! implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

/// The content type attached to every uploaded report.
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Creates objects in buckets.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create a new object holding `body` under `key` in `bucket`.
    async fn create_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

/// S3-backed storage.
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Build a storage handle with a fresh S3 client.
    pub fn new(sdk_config: &SdkConfig) -> Self {
        S3Storage {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn create_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to upload {} bytes to remote object {:?} in bucket {:?}",
                    size, key, bucket
                )
            })?;
        Ok(())
    }
}
