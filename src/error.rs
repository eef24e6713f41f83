use std::fmt;
use std::io;
#[derive(Debug)]
pub enum BackupError {
    Config(String),
    Dump { database: String, message: String },
    Upload(String),
    Io(io::Error),
}

impl BackupError {
    pub fn dump(database: &str, message: impl Into<String>) -> Self {
        BackupError::Dump {
            database: database.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::Config(msg) => write!(f, "Configuration error: {}", msg),
            BackupError::Dump { database, message } => {
                write!(f, "Dump error for database {}: {}", database, message)
            }
            BackupError::Upload(msg) => write!(f, "Upload error: {}", msg),
            BackupError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackupError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BackupError {
    fn from(err: io::Error) -> Self {
        BackupError::Io(err)
    }
}

impl From<object_store::Error> for BackupError {
    fn from(err: object_store::Error) -> Self {
        BackupError::Upload(err.to_string())
    }
}

impl From<cron::error::Error> for BackupError {
    fn from(err: cron::error::Error) -> Self {
        BackupError::Config(format!("invalid cron expression: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
