use super::artifact::{unique_artifact_path, BackupArtifact};
use super::driver::DatabaseDumper;
use crate::config::DumpConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Runs `pg_dump -d <database> -f <file>` as a subprocess.
///
/// Host, port and credentials come from the ambient libpq environment
/// (`PGHOST`, `PGUSER`, `PGPASSWORD`, ...) or from `extra_args`.
pub struct PgDumpDumper {
    config: DumpConfig,
}

impl PgDumpDumper {
    pub fn new(config: &DumpConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn command(&self, database: &str, artifact: &BackupArtifact) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.extra_args)
            .arg("-d")
            .arg(database)
            .arg("-f")
            .arg(artifact.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl DatabaseDumper for PgDumpDumper {
    async fn dump(&self, database: &str) -> Result<BackupArtifact> {
        let created_at = Utc::now();
        tokio::fs::create_dir_all(&self.config.temp_dir)
            .await
            .map_err(|e| {
                BackupError::dump(
                    database,
                    format!("cannot create {}: {}", self.config.temp_dir.display(), e),
                )
            })?;

        // Owned before the subprocess starts so partial output is removed on failure.
        let artifact = BackupArtifact::new(
            unique_artifact_path(&self.config.temp_dir, database, created_at),
            database,
            created_at,
        );

        debug!(
            "Running {} for database {} into {}",
            self.config.command,
            database,
            artifact.path().display()
        );
        let output = match timeout(self.config.timeout, self.command(database, &artifact).output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(BackupError::dump(
                    database,
                    format!("failed to launch {}: {}", self.config.command, e),
                ))
            }
            Err(_) => {
                return Err(BackupError::dump(
                    database,
                    format!(
                        "{} timed out after {}s",
                        self.config.command,
                        self.config.timeout.as_secs()
                    ),
                ))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", self.config.command, output.status)
            } else {
                format!("{} exited with {}: {}", self.config.command, output.status, stderr)
            };
            return Err(BackupError::dump(database, message));
        }

        let size = tokio::fs::metadata(artifact.path())
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        info!(
            "Backup created for database {}: {} ({} bytes)",
            database,
            artifact.path().display(),
            size
        );
        Ok(artifact)
    }

    fn engine_name(&self) -> &'static str {
        "PostgreSQL"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    // `sh -c <script> pg_dump -d <db> -f <path>` puts the database in $2 and the path in $4.
    fn shell_dumper(dir: &std::path::Path, script: &str, timeout: Duration) -> PgDumpDumper {
        PgDumpDumper::new(&DumpConfig {
            command: "sh".to_string(),
            extra_args: vec!["-c".to_string(), script.to_string(), "pg_dump".to_string()],
            temp_dir: dir.to_path_buf(),
            timeout,
        })
    }

    fn files_in(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_successful_dump_produces_artifact() {
        let dir = tempdir().unwrap();
        let dumper = shell_dumper(
            dir.path(),
            r#"printf -- '-- dump of %s\n' "$2" > "$4""#,
            Duration::from_secs(10),
        );

        let artifact = dumper.dump("alpha").await.unwrap();
        assert_eq!(artifact.database(), "alpha");
        assert_eq!(artifact.path().parent(), Some(dir.path()));
        let contents = std::fs::read_to_string(artifact.path()).unwrap();
        assert_eq!(contents, "-- dump of alpha\n");

        drop(artifact);
        assert_eq!(files_in(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let dir = tempdir().unwrap();
        let dumper = shell_dumper(
            dir.path(),
            r#"echo "partial" > "$4"; echo "database \"$2\" does not exist" >&2; exit 1"#,
            Duration::from_secs(10),
        );

        match dumper.dump("only_db").await {
            Err(BackupError::Dump { database, message }) => {
                assert_eq!(database, "only_db");
                assert!(message.contains("database \"only_db\" does not exist"));
            }
            other => panic!("expected dump error, got {:?}", other),
        }
        assert_eq!(files_in(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_launch_failure_is_dump_error() {
        let dir = tempdir().unwrap();
        let dumper = PgDumpDumper::new(&DumpConfig {
            command: "/nonexistent/pg_dump".to_string(),
            extra_args: Vec::new(),
            temp_dir: dir.path().to_path_buf(),
            timeout: Duration::from_secs(10),
        });

        let err = dumper.dump("alpha").await.unwrap_err();
        assert!(matches!(err, BackupError::Dump { ref database, .. } if database == "alpha"));
        assert!(err.to_string().contains("failed to launch"));
    }

    #[tokio::test]
    async fn test_timeout_is_dump_error() {
        let dir = tempdir().unwrap();
        let dumper = shell_dumper(dir.path(), "sleep 5", Duration::from_millis(100));

        let err = dumper.dump("slow").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(files_in(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_creates_missing_temp_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("dumps");
        let dumper = shell_dumper(&nested, r#"echo ok > "$4""#, Duration::from_secs(10));

        let artifact = dumper.dump("alpha").await.unwrap();
        assert!(artifact.path().starts_with(&nested));
    }
}
