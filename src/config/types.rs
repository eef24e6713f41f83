use crate::backup::scheduler::CronSchedule;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CRON: &str = "0 */8 * * *";
pub const DEFAULT_DUMP_COMMAND: &str = "pg_dump";
pub const DEFAULT_DUMP_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_MAX_CONCURRENT_DUMPS: usize = 4;

/// What the scheduler does when a trigger fires while a previous run is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    #[default]
    Allow,
    Skip,
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlapPolicy::Allow => write!(f, "allow"),
            OverlapPolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Shape of the object key an upload is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyLayout {
    /// `backup_<timestamp>.sql`
    #[default]
    Flat,
    /// `<database>/backup_<timestamp>.sql`
    PerDatabase,
}

#[derive(Clone)]
pub struct StorageConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub force_path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub command: String,
    pub extra_args: Vec<String>,
    pub temp_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_DUMP_COMMAND.to_string(),
            extra_args: Vec::new(),
            temp_dir: std::env::temp_dir(),
            timeout: DEFAULT_DUMP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub databases: Vec<String>,
    pub run_on_startup: bool,
    pub schedule: CronSchedule,
    pub storage: StorageConfig,
    pub dump: DumpConfig,
    pub upload_timeout: Duration,
    pub max_concurrent_dumps: usize,
    pub overlap_policy: OverlapPolicy,
    pub key_layout: KeyLayout,
}
