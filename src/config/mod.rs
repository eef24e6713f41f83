mod types;

pub use types::*;

use crate::backup::scheduler::CronSchedule;
use crate::error::{BackupError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const ENV_DATABASES: &str = "DATABASES";
pub const ENV_RUN_ON_STARTUP: &str = "RUN_ON_STARTUP";
pub const ENV_CRON: &str = "CRON";
pub const ENV_S3_REGION: &str = "AWS_S3_REGION";
pub const ENV_S3_ENDPOINT: &str = "AWS_S3_ENDPOINT";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_S3_BUCKET: &str = "AWS_S3_BUCKET";
pub const ENV_S3_FORCE_PATH_STYLE: &str = "AWS_S3_FORCE_PATH_STYLE";
pub const ENV_TEMP_DIR: &str = "BACKUP_TEMP_DIR";
pub const ENV_DUMP_COMMAND: &str = "DUMP_COMMAND";
pub const ENV_DUMP_EXTRA_ARGS: &str = "DUMP_EXTRA_ARGS";
pub const ENV_DUMP_TIMEOUT: &str = "DUMP_TIMEOUT_SECS";
pub const ENV_UPLOAD_TIMEOUT: &str = "UPLOAD_TIMEOUT_SECS";
pub const ENV_MAX_CONCURRENT_DUMPS: &str = "MAX_CONCURRENT_DUMPS";
pub const ENV_OVERLAP_POLICY: &str = "OVERLAP_POLICY";
pub const ENV_KEY_INCLUDE_DATABASE: &str = "KEY_INCLUDE_DATABASE";

/// Loads a `.env` file from the working directory or one of its parents.
///
/// Variables already present in the process environment are not overridden.
/// Returns the path of the loaded file, or `None` when there is no file.
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    settle_dotenv(dotenvy::dotenv())
}

fn settle_dotenv<T>(loaded: std::result::Result<T, dotenvy::Error>) -> Result<Option<T>> {
    match loaded {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(BackupError::Config(format!("failed to read .env file: {}", e))),
    }
}

/// Loads and validates the configuration from the process environment.
pub fn from_env() -> Result<AppConfig> {
    from_vars(std::env::vars())
}

/// Builds a validated configuration from arbitrary key/value pairs.
///
/// Blank values count as unset. Every problem is reported as
/// [`BackupError::Config`], which is fatal at startup.
pub fn from_vars<I, K, V>(vars: I) -> Result<AppConfig>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let vars: HashMap<String, String> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(_, v)| !v.trim().is_empty())
        .collect();
    let get = |key: &str| vars.get(key).map(|v| v.trim());

    let databases = parse_databases(get(ENV_DATABASES).unwrap_or_default());
    if databases.is_empty() {
        return Err(BackupError::Config(format!(
            "{} must list at least one database",
            ENV_DATABASES
        )));
    }

    let run_on_startup = get(ENV_RUN_ON_STARTUP)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let cron = get(ENV_CRON).unwrap_or(DEFAULT_CRON);
    let schedule = CronSchedule::parse(cron)?;

    let storage = StorageConfig {
        region: required(&get, ENV_S3_REGION)?,
        endpoint: get(ENV_S3_ENDPOINT).map(str::to_string),
        access_key_id: required(&get, ENV_ACCESS_KEY_ID)?,
        secret_access_key: required(&get, ENV_SECRET_ACCESS_KEY)?,
        bucket: required(&get, ENV_S3_BUCKET)?,
        force_path_style: parse_bool(ENV_S3_FORCE_PATH_STYLE, get(ENV_S3_FORCE_PATH_STYLE), true)?,
    };

    let defaults = DumpConfig::default();
    let dump = DumpConfig {
        command: get(ENV_DUMP_COMMAND)
            .map(str::to_string)
            .unwrap_or(defaults.command),
        extra_args: get(ENV_DUMP_EXTRA_ARGS)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        temp_dir: get(ENV_TEMP_DIR).map(PathBuf::from).unwrap_or(defaults.temp_dir),
        timeout: parse_secs(ENV_DUMP_TIMEOUT, get(ENV_DUMP_TIMEOUT), defaults.timeout)?,
    };

    let upload_timeout = parse_secs(ENV_UPLOAD_TIMEOUT, get(ENV_UPLOAD_TIMEOUT), DEFAULT_UPLOAD_TIMEOUT)?;
    let max_concurrent_dumps = match get(ENV_MAX_CONCURRENT_DUMPS) {
        Some(v) => parse_positive(ENV_MAX_CONCURRENT_DUMPS, v)? as usize,
        None => DEFAULT_MAX_CONCURRENT_DUMPS,
    };

    let overlap_policy = match get(ENV_OVERLAP_POLICY).map(str::to_ascii_lowercase).as_deref() {
        None | Some("allow") => OverlapPolicy::Allow,
        Some("skip") => OverlapPolicy::Skip,
        Some(other) => {
            return Err(BackupError::Config(format!(
                "{} must be 'allow' or 'skip', got '{}'",
                ENV_OVERLAP_POLICY, other
            )))
        }
    };

    let key_layout = if parse_bool(ENV_KEY_INCLUDE_DATABASE, get(ENV_KEY_INCLUDE_DATABASE), false)? {
        KeyLayout::PerDatabase
    } else {
        KeyLayout::Flat
    };

    let config = AppConfig {
        databases,
        run_on_startup,
        schedule,
        storage,
        dump,
        upload_timeout,
        max_concurrent_dumps,
        overlap_policy,
        key_layout,
    };
    info!(
        "Loaded configuration: {} database(s), cron '{}', bucket '{}'",
        config.databases.len(),
        config.schedule.expression(),
        config.storage.bucket
    );
    debug!("Configuration: {:?}", config);
    Ok(config)
}

fn parse_databases(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|db| !db.is_empty())
        .map(str::to_string)
        .collect()
}

fn required<'a>(get: &impl Fn(&str) -> Option<&'a str>, key: &str) -> Result<String> {
    get(key)
        .map(str::to_string)
        .ok_or_else(|| BackupError::Config(format!("{} is required", key)))
}

fn parse_bool(key: &str, value: Option<&str>, default: bool) -> Result<bool> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(BackupError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, value
        ))),
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(BackupError::Config(format!(
            "{} must be a positive integer, got '{}'",
            key, value
        ))),
    }
}

fn parse_secs(key: &str, value: Option<&str>, default: Duration) -> Result<Duration> {
    match value {
        Some(v) => Ok(Duration::from_secs(parse_positive(key, v)?)),
        None => Ok(default),
    }
}
