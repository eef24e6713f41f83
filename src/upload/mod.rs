mod key;
mod s3;
mod uploader;

pub use key::storage_key;
#[cfg(test)]
pub(crate) use key::is_flat_key;
pub use s3::ObjectStoreUploader;
pub use uploader::BackupUploader;

use crate::config::StorageConfig;
use crate::error::Result;
use std::sync::Arc;

pub fn create_uploader(config: &StorageConfig) -> Result<Arc<dyn BackupUploader>> {
    Ok(Arc::new(ObjectStoreUploader::s3(config)?))
}
