mod backup;
mod config;
mod database;
mod error;
mod log;
mod upload;

use backup::{Archiver, BackupStats, JobRunner, Scheduler};
use config::AppConfig;
use error::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn build_scheduler(config: &AppConfig, stats: Arc<BackupStats>) -> Result<Scheduler> {
    let uploader = upload::create_uploader(&config.storage)?;
    let dumper = database::create_dumper(&config.dump);
    let archiver = Archiver::new(uploader, config.key_layout, config.upload_timeout);
    let runner = JobRunner::new(
        dumper,
        archiver,
        config.max_concurrent_dumps,
        stats,
    );
    Ok(Scheduler::new(config, Arc::new(runner)))
}

#[tokio::main]
async fn main() {
    let dotenv = config::load_dotenv();
    log::init();

    info!("PostgreSQL to S3 backup service starting...");
    match dotenv {
        Ok(Some(path)) => debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("{}", e),
    }

    let stats = Arc::new(BackupStats::default());
    let scheduler = match config::from_env().and_then(|config| build_scheduler(&config, stats.clone())) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let ctrl_c_count = Arc::new(AtomicUsize::new(0));
    let handler_token = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        let count = ctrl_c_count.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            println!("\nShutdown signal received, waiting for running backups. Send again to force exit...");
            handler_token.cancel();
        } else {
            println!("\nForce exiting...");
            std::process::exit(130);
        }
    }) {
        error!("Failed to install signal handler: {}", e);
    }

    scheduler.run(shutdown).await;

    let totals = stats.snapshot();
    info!(
        "Totals: {} run(s), {} skipped, {} dump failure(s), {} upload(s) ok, {} upload failure(s)",
        totals.runs_started,
        totals.runs_skipped,
        totals.dumps_failed,
        totals.uploads_succeeded,
        totals.uploads_failed
    );
    if totals.consecutive_upload_failures > 0 {
        warn!(
            "Last {} upload(s) failed before shutdown",
            totals.consecutive_upload_failures
        );
    }
    if let Some(last) = stats.last_run() {
        info!(
            "Last run: {} run started {} took {:.1}s, {} succeeded, {} failed",
            last.trigger,
            last.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            last.duration.as_secs_f64(),
            last.succeeded(),
            last.failed()
        );
    }

    info!("Backup service exited normally");
}
