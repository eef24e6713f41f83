use crate::error::Result;
use async_trait::async_trait;

/// A remote sink that stores a byte payload under a key.
///
/// Implementations are shared by every in-flight upload and must be safe
/// for concurrent use.
#[async_trait]
pub trait BackupUploader: Send + Sync {
    async fn put(&self, key: &str, payload: Vec<u8>) -> Result<()>;
    fn name(&self) -> &'static str;
    fn bucket(&self) -> &str;
}
