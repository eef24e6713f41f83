mod artifact;
mod driver;
mod pg_dump;

pub use artifact::BackupArtifact;
#[cfg(test)]
pub(crate) use artifact::unique_artifact_path;
pub use driver::DatabaseDumper;
pub use pg_dump::PgDumpDumper;

use crate::config::DumpConfig;
use std::sync::Arc;

pub fn create_dumper(config: &DumpConfig) -> Arc<dyn DatabaseDumper> {
    Arc::new(PgDumpDumper::new(config))
}
