use crate::config::KeyLayout;
use crate::database::BackupArtifact;
use crate::error::{BackupError, Result};
use crate::upload::{storage_key, BackupUploader};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReceipt {
    pub key: String,
    pub size: u64,
    pub sha256: String,
}

/// Uploads dump artifacts to the shared object storage client.
pub struct Archiver {
    uploader: Arc<dyn BackupUploader>,
    layout: KeyLayout,
    timeout: Duration,
}

impl Archiver {
    pub fn new(uploader: Arc<dyn BackupUploader>, layout: KeyLayout, timeout: Duration) -> Self {
        Self {
            uploader,
            layout,
            timeout,
        }
    }

    /// Reads the artifact into memory and stores it under a key derived
    /// from the upload time. Failures are logged here and returned.
    pub async fn archive(&self, artifact: &BackupArtifact) -> Result<ArchiveReceipt> {
        match self.upload(artifact).await {
            Ok(receipt) => {
                info!(
                    "File uploaded successfully to {} bucket {}: {} ({} bytes, sha256 {}, {}s after dump)",
                    self.uploader.name(),
                    self.uploader.bucket(),
                    receipt.key,
                    receipt.size,
                    receipt.sha256,
                    (Utc::now() - artifact.created_at()).num_seconds()
                );
                Ok(receipt)
            }
            Err(e) => {
                error!(
                    "Error uploading backup of database {}: {}",
                    artifact.database(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn upload(&self, artifact: &BackupArtifact) -> Result<ArchiveReceipt> {
        // The whole dump is held in memory for the single put.
        let payload = tokio::fs::read(artifact.path()).await.map_err(|e| {
            BackupError::Upload(format!("cannot read {}: {}", artifact.path().display(), e))
        })?;
        let size = payload.len() as u64;
        let sha256 = sha256_hex(&payload);
        let key = storage_key(Utc::now(), artifact.database(), self.layout);

        match timeout(self.timeout, self.uploader.put(&key, payload)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(BackupError::Upload(format!(
                    "upload of {} timed out after {}s",
                    key,
                    self.timeout.as_secs()
                )))
            }
        }

        Ok(ArchiveReceipt { key, size, sha256 })
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::testing::RecordingUploader;
    use crate::upload::{is_flat_key, ObjectStoreUploader};
    use object_store::memory::InMemory;
    use object_store::path::Path as StorePath;
    use object_store::ObjectStore;
    use tempfile::tempdir;

    fn artifact_with(dir: &std::path::Path, database: &str, contents: &[u8]) -> BackupArtifact {
        let path = dir.join(format!("{}.sql", database));
        std::fs::write(&path, contents).unwrap();
        BackupArtifact::new(path, database, Utc::now())
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn test_archive_stores_bytes_under_timestamp_key() {
        let dir = tempdir().unwrap();
        let store = Arc::new(InMemory::new());
        let archiver = Archiver::new(
            Arc::new(ObjectStoreUploader::new(store.clone(), "backups")),
            KeyLayout::Flat,
            Duration::from_secs(5),
        );
        let artifact = artifact_with(dir.path(), "alpha", b"-- alpha dump\n");

        let receipt = archiver.archive(&artifact).await.unwrap();
        assert!(is_flat_key(&receipt.key), "unexpected key {}", receipt.key);
        assert_eq!(receipt.size, 14);
        assert_eq!(receipt.sha256, sha256_hex(b"-- alpha dump\n"));

        let stored = store
            .get(&StorePath::from(receipt.key.as_str()))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), b"-- alpha dump\n");
    }

    #[tokio::test]
    async fn test_per_database_layout_prefixes_key() {
        let dir = tempdir().unwrap();
        let uploader = Arc::new(RecordingUploader::default());
        let archiver = Archiver::new(uploader.clone(), KeyLayout::PerDatabase, Duration::from_secs(5));
        let artifact = artifact_with(dir.path(), "beta", b"-- beta\n");

        let receipt = archiver.archive(&artifact).await.unwrap();
        let (db, name) = receipt.key.split_once('/').unwrap();
        assert_eq!(db, "beta");
        assert!(is_flat_key(name));
        assert_eq!(uploader.keys(), vec![receipt.key]);
    }

    #[tokio::test]
    async fn test_upload_failure_is_returned() {
        let dir = tempdir().unwrap();
        let uploader = Arc::new(RecordingUploader::failing("AccessDenied: bad credentials"));
        let archiver = Archiver::new(uploader.clone(), KeyLayout::Flat, Duration::from_secs(5));
        let artifact = artifact_with(dir.path(), "alpha", b"-- alpha\n");

        let err = archiver.archive(&artifact).await.unwrap_err();
        assert!(matches!(err, BackupError::Upload(ref msg) if msg.contains("AccessDenied")));
        assert_eq!(uploader.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_upload_error() {
        let dir = tempdir().unwrap();
        let uploader = Arc::new(RecordingUploader::default());
        let archiver = Archiver::new(uploader.clone(), KeyLayout::Flat, Duration::from_secs(5));
        let artifact = BackupArtifact::new(dir.path().join("missing.sql"), "alpha", Utc::now());

        let err = archiver.archive(&artifact).await.unwrap_err();
        assert!(matches!(err, BackupError::Upload(_)));
        assert_eq!(uploader.calls(), 0);
    }

    #[tokio::test]
    async fn test_upload_timeout() {
        let dir = tempdir().unwrap();
        let uploader = Arc::new(RecordingUploader::stalled());
        let archiver = Archiver::new(uploader, KeyLayout::Flat, Duration::from_millis(50));
        let artifact = artifact_with(dir.path(), "alpha", b"-- alpha\n");

        let err = archiver.archive(&artifact).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
