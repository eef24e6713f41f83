use super::archive::{ArchiveReceipt, Archiver};
use super::stats::BackupStats;
use crate::database::DatabaseDumper;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    Startup,
    Scheduled,
}

impl std::fmt::Display for RunTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunTrigger::Startup => write!(f, "startup"),
            RunTrigger::Scheduled => write!(f, "scheduled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Archived(ArchiveReceipt),
    DumpFailed(String),
    UploadFailed(String),
}

#[derive(Debug, Clone)]
pub struct DatabaseOutcome {
    pub database: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl DatabaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Archived(_))
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub trigger: RunTrigger,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcomes: Vec<DatabaseOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Runs the dump-then-archive pipeline for a batch of databases.
///
/// Pipelines run concurrently and independently; a failure is confined to
/// its own database and reported in the returned [`RunSummary`].
pub struct JobRunner {
    dumper: Arc<dyn DatabaseDumper>,
    archiver: Archiver,
    permits: Semaphore,
    stats: Arc<BackupStats>,
}

impl JobRunner {
    /// `max_concurrent` bounds in-flight pipelines across all runs of this runner.
    pub fn new(
        dumper: Arc<dyn DatabaseDumper>,
        archiver: Archiver,
        max_concurrent: usize,
        stats: Arc<BackupStats>,
    ) -> Self {
        Self {
            dumper,
            archiver,
            permits: Semaphore::new(max_concurrent.max(1)),
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<BackupStats> {
        &self.stats
    }

    pub async fn run(&self, trigger: RunTrigger, databases: &[String]) -> RunSummary {
        self.stats.record_run_started();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            "Starting {} backup run for {} database(s) using {}",
            trigger,
            databases.len(),
            self.dumper.engine_name()
        );

        let outcomes = join_all(databases.iter().map(|db| self.run_database(db))).await;

        let summary = RunSummary {
            trigger,
            started_at,
            duration: start.elapsed(),
            outcomes,
        };
        for outcome in &summary.outcomes {
            let status = match &outcome.outcome {
                Outcome::Archived(receipt) => format!("archived as {}", receipt.key),
                Outcome::DumpFailed(_) => "dump failed".to_string(),
                Outcome::UploadFailed(_) => "upload failed".to_string(),
            };
            debug!(
                "{} run {}: {} {} in {:.1}s",
                summary.trigger,
                summary.started_at.format("%H:%M:%S"),
                outcome.database,
                status,
                outcome.duration.as_secs_f64()
            );
        }
        if summary.failed() == 0 {
            info!(
                "Backup run finished: {} succeeded in {:.1}s",
                summary.succeeded(),
                summary.duration.as_secs_f64()
            );
        } else {
            let failed: Vec<&str> = summary
                .outcomes
                .iter()
                .filter(|o| !o.is_success())
                .map(|o| o.database.as_str())
                .collect();
            warn!(
                "Backup run finished: {} succeeded, {} failed ({}) in {:.1}s",
                summary.succeeded(),
                summary.failed(),
                failed.join(", "),
                summary.duration.as_secs_f64()
            );
        }
        self.stats.record_run_finished(summary.clone());
        summary
    }

    async fn run_database(&self, database: &str) -> DatabaseOutcome {
        let start = Instant::now();
        let outcome = match self.permits.acquire().await {
            Ok(_permit) => self.dump_and_archive(database).await,
            Err(e) => Outcome::DumpFailed(format!("pipeline closed: {}", e)),
        };
        DatabaseOutcome {
            database: database.to_string(),
            outcome,
            duration: start.elapsed(),
        }
    }

    async fn dump_and_archive(&self, database: &str) -> Outcome {
        let artifact = match self.dumper.dump(database).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!("Backup failed: {}", e);
                self.stats.record_dump_failure();
                return Outcome::DumpFailed(e.to_string());
            }
        };

        match self.archiver.archive(&artifact).await {
            Ok(receipt) => {
                self.stats.record_upload_success();
                Outcome::Archived(receipt)
            }
            Err(e) => {
                self.stats.record_upload_failure();
                Outcome::UploadFailed(e.to_string())
            }
        }
    }
}
