use super::uploader::BackupUploader;
use crate::config::StorageConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tracing::debug;

/// Uploads through any [`ObjectStore`]; in production an S3-compatible bucket.
pub struct ObjectStoreUploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreUploader {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
        }
    }

    /// Builds the S3 client once; failures here are configuration errors.
    pub fn s3(config: &StorageConfig) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_region(&config.region)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_virtual_hosted_style_request(!config.force_path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| BackupError::Config(format!("invalid object storage settings: {}", e)))?;
        Ok(Self::new(Arc::new(store), &config.bucket))
    }
}

#[async_trait]
impl BackupUploader for ObjectStoreUploader {
    async fn put(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        let location = Path::from(key);
        let result = self.store.put(&location, PutPayload::from(payload)).await?;
        debug!("Stored {} in bucket {}: {:?}", location, self.bucket, result);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "S3"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
