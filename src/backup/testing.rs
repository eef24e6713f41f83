//! In-process stand-ins for the dump utility and the storage sink.

use crate::database::{unique_artifact_path, BackupArtifact, DatabaseDumper};
use crate::error::{BackupError, Result};
use crate::upload::BackupUploader;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Default)]
pub struct RecordingUploader {
    keys: Mutex<Vec<String>>,
    failure: Option<String>,
    stalled: bool,
}

impl RecordingUploader {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

#[async_trait]
impl BackupUploader for RecordingUploader {
    async fn put(&self, key: &str, _payload: Vec<u8>) -> Result<()> {
        self.keys.lock().unwrap().push(key.to_string());
        if self.stalled {
            std::future::pending::<()>().await;
        }
        match &self.failure {
            Some(message) => Err(BackupError::Upload(message.clone())),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }

    fn bucket(&self) -> &str {
        "test-bucket"
    }
}

pub struct StubDumper {
    dir: PathBuf,
    failing: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl StubDumper {
    pub fn new(dir: &std::path::Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            failing: HashSet::new(),
            gate: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(mut self, database: &str) -> Self {
        self.failing.insert(database.to_string());
        self
    }

    /// Every dump waits for a permit on `gate` before finishing.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseDumper for StubDumper {
    async fn dump(&self, database: &str) -> Result<BackupArtifact> {
        self.calls.lock().unwrap().push(database.to_string());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(database) {
            return Err(BackupError::dump(
                database,
                "pg_dump: error: connection to server failed",
            ));
        }

        let created_at = Utc::now();
        let path = unique_artifact_path(&self.dir, database, created_at);
        std::fs::write(&path, format!("-- dump of {}\n", database))?;
        Ok(BackupArtifact::new(path, database, created_at))
    }

    fn engine_name(&self) -> &'static str {
        "stub"
    }
}
