use super::job::RunSummary;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::warn;

/// Consecutive upload failures at which every further failure is escalated.
pub const UPLOAD_FAILURE_ALERT_THRESHOLD: u64 = 3;

/// Process-wide counters for backup activity, shared across runs.
#[derive(Debug, Default)]
pub struct BackupStats {
    runs_started: AtomicU64,
    runs_skipped: AtomicU64,
    dumps_failed: AtomicU64,
    uploads_succeeded: AtomicU64,
    uploads_failed: AtomicU64,
    consecutive_upload_failures: AtomicU64,
    last_run: Mutex<Option<RunSummary>>,
    next_run: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub runs_started: u64,
    pub runs_skipped: u64,
    pub dumps_failed: u64,
    pub uploads_succeeded: u64,
    pub uploads_failed: u64,
    pub consecutive_upload_failures: u64,
}

impl BackupStats {
    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_skipped(&self) {
        self.runs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dump_failure(&self) {
        self.dumps_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload_success(&self) {
        self.uploads_succeeded.fetch_add(1, Ordering::Relaxed);
        self.consecutive_upload_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_upload_failure(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
        let streak = self.consecutive_upload_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if streak >= UPLOAD_FAILURE_ALERT_THRESHOLD {
            warn!(
                consecutive_failures = streak,
                "ALERT: {} consecutive uploads failed, backups are not reaching object storage",
                streak
            );
        }
    }

    pub fn record_run_finished(&self, summary: RunSummary) {
        if let Ok(mut last) = self.last_run.lock() {
            *last = Some(summary);
        }
    }

    pub fn set_next_run(&self, next: Option<DateTime<Utc>>) {
        if let Ok(mut slot) = self.next_run.lock() {
            *slot = next;
        }
    }

    pub fn last_run(&self) -> Option<RunSummary> {
        self.last_run.lock().ok().and_then(|last| last.clone())
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.next_run.lock().ok().and_then(|next| *next)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_skipped: self.runs_skipped.load(Ordering::Relaxed),
            dumps_failed: self.dumps_failed.load(Ordering::Relaxed),
            uploads_succeeded: self.uploads_succeeded.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            consecutive_upload_failures: self.consecutive_upload_failures.load(Ordering::Relaxed),
        }
    }
}
