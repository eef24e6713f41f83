use super::job::{JobRunner, RunSummary, RunTrigger};
use crate::config::{AppConfig, OverlapPolicy};
use crate::error::{BackupError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A validated cron expression, evaluated in UTC.
///
/// Accepts the classic five fields (minute first, day-of-week 0-7 with
/// 0 and 7 meaning Sunday) as well as the six/seven-field form of the
/// `cron` crate, whose day-of-week runs 1-7 from Sunday.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let normalized = match fields.len() {
            5 => format!(
                "0 {} {} {} {} {}",
                fields[0],
                fields[1],
                fields[2],
                fields[3],
                classic_day_of_week(fields[4])?
            ),
            6 | 7 => expression.to_string(),
            n => {
                return Err(BackupError::Config(format!(
                    "cron expression '{}' has {} fields, expected 5, 6 or 7",
                    expression, n
                )))
            }
        };
        let schedule = cron::Schedule::from_str(&normalized)?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

/// Rewrites a classic day-of-week field (0-7, Sunday = 0 or 7) into the
/// `cron` crate's numbering (1-7, Sunday = 1).
///
/// Numeric items are expanded to an explicit day list so ranges that end
/// on Sunday (`5-7`) and steps (`*/2`, `1-5/2`) keep their meaning. Named
/// items (`MON-FRI`) are passed through untouched.
fn classic_day_of_week(field: &str) -> Result<String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let invalid = || BackupError::Config(format!("invalid day-of-week field '{}'", field));
    let number = |s: &str| -> Result<u32> {
        match s.parse::<u32>() {
            Ok(n) if n <= 7 => Ok(n),
            _ => Err(invalid()),
        }
    };

    let mut days = BTreeSet::new();
    let mut named = Vec::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => match step.parse::<usize>() {
                Ok(step) if step > 0 => (range, Some(step)),
                _ => return Err(invalid()),
            },
            None => (item, None),
        };

        if range.chars().any(|c| c.is_ascii_alphabetic()) {
            named.push(item.to_string());
            continue;
        }

        let (start, end) = if range == "*" {
            (0, 6)
        } else if let Some((start, end)) = range.split_once('-') {
            (number(start)?, number(end)?)
        } else {
            let n = number(range)?;
            // `n/step` runs from n to Saturday.
            (n, if step.is_some() { 6 } else { n })
        };
        if start > end {
            return Err(invalid());
        }

        for day in (start..=end).step_by(step.unwrap_or(1)) {
            days.insert(day % 7);
        }
    }

    let converted = days
        .into_iter()
        .map(|day| (day + 1).to_string())
        .chain(named);
    Ok(converted.collect::<Vec<_>>().join(","))
}

/// Fires a [`JobRunner`] run for every configured database on each cron tick.
pub struct Scheduler {
    schedule: CronSchedule,
    runner: Arc<JobRunner>,
    databases: Arc<[String]>,
    run_on_startup: bool,
    overlap_policy: OverlapPolicy,
}

impl Scheduler {
    pub fn new(config: &AppConfig, runner: Arc<JobRunner>) -> Self {
        Self {
            schedule: config.schedule.clone(),
            runner,
            databases: config.databases.clone().into(),
            run_on_startup: config.run_on_startup,
            overlap_policy: config.overlap_policy,
        }
    }

    /// Runs until `shutdown` is cancelled, then waits for in-flight runs to finish.
    ///
    /// Runs are spawned, so a slow run never delays the next trigger.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut in_flight: JoinSet<RunSummary> = JoinSet::new();
        let stats = self.runner.stats().clone();

        if self.run_on_startup {
            info!("Running backup on startup");
            self.trigger(&mut in_flight, RunTrigger::Startup);
        }

        info!(
            "Backup scheduled with cron '{}' (UTC), overlap policy {}",
            self.schedule.expression(),
            self.overlap_policy
        );

        let mut last_fire: Option<DateTime<Utc>> = None;
        loop {
            let now = Utc::now();
            let base = last_fire.map_or(now, |last| last.max(now));
            let Some(next) = self.schedule.next_after(base) else {
                warn!("Cron expression '{}' has no upcoming fire time", self.schedule.expression());
                break;
            };
            stats.set_next_run(Some(next));
            info!("Next backup run at {}", next.format("%Y-%m-%d %H:%M:%S UTC"));

            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Scheduler shutdown requested");
                    break;
                }
                _ = sleep(wait) => {}
            }

            last_fire = Some(next);
            self.trigger(&mut in_flight, RunTrigger::Scheduled);
        }

        if let Some(next) = stats.next_run() {
            info!(
                "Scheduler disarmed, run due at {} will not fire",
                next.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        stats.set_next_run(None);
        if !in_flight.is_empty() {
            info!("Waiting for {} in-flight backup run(s) to finish", in_flight.len());
        }
        while let Some(result) = in_flight.join_next().await {
            log_join(result);
        }
        info!("Scheduler stopped");
    }

    fn trigger(&self, in_flight: &mut JoinSet<RunSummary>, trigger: RunTrigger) {
        while let Some(result) = in_flight.try_join_next() {
            log_join(result);
        }

        if self.overlap_policy == OverlapPolicy::Skip && !in_flight.is_empty() {
            warn!("Skipping {} backup run: previous run still in progress", trigger);
            self.runner.stats().record_run_skipped();
            return;
        }

        let runner = self.runner.clone();
        let databases = self.databases.clone();
        in_flight.spawn(async move { runner.run(trigger, &databases).await });
    }
}

fn log_join(result: std::result::Result<RunSummary, tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("Backup run task failed: {}", e);
    }
}
