use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A dump file on local disk, owned by the pipeline that produced it.
///
/// Dropping the artifact deletes the file, so whichever way the pipeline
/// ends (uploaded, upload failed, cancelled) nothing is left behind.
#[derive(Debug)]
pub struct BackupArtifact {
    path: PathBuf,
    database: String,
    created_at: DateTime<Utc>,
}

impl BackupArtifact {
    pub fn new(path: PathBuf, database: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            path,
            database: database.to_string(),
            created_at,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Drop for BackupArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed local artifact {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove local artifact {}: {}", self.path.display(), e),
        }
    }
}

/// Returns a fresh path in `dir` for a dump of `database`.
///
/// Names combine the creation time in nanoseconds with a process-wide
/// sequence number, so concurrent calls never collide.
pub fn unique_artifact_path(dir: &Path, database: &str, now: DateTime<Utc>) -> PathBuf {
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000));
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("{}_{}_{}.sql", sanitize(database), nanos, seq))
}

fn sanitize(database: &str) -> String {
    let cleaned: String = database
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "db".to_string()
    } else {
        cleaned
    }
}
