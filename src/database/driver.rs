use super::artifact::BackupArtifact;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait DatabaseDumper: Send + Sync {
    /// Writes a full dump of `database` to a fresh local file.
    ///
    /// Fails with [`crate::error::BackupError::Dump`] and leaves no file behind.
    async fn dump(&self, database: &str) -> Result<BackupArtifact>;
    fn engine_name(&self) -> &'static str;
}
