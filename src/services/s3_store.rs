//! S3-compatible object store (AWS S3, MinIO, R2, ...).

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{Builder, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use bytes::Bytes;
use std::time::Duration;

use super::object_store::{ObjectStore, StoreError, StoreResult};

/// S3 connection settings.
#[derive(Clone, Debug)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint URL for S3-compatible services.
    pub endpoint: Option<String>,
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client using credentials from the standard AWS environment
    /// (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, profiles, IMDS).
    pub async fn new(config: S3Config) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        let mut builder = Builder::from(&sdk_config).region(Region::new(config.region));

        // path-style addressing is what MinIO and most self-hosted stores expect
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
        }
    }
}

fn is_missing(message: &str) -> bool {
    message.contains("NoSuchKey") || message.contains("404") || message.contains("NotFound")
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::Backend(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                if is_missing(&message) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Backend(message)
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(data.into_bytes())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Backend(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String> {
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| StoreError::Presign(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StoreError::Presign(DisplayErrorContext(&e).to_string()))?;
        Ok(request.uri().to_string())
    }

    fn kind(&self) -> &'static str {
        "s3"
    }
}
