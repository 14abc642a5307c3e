use std::process::ExitStatus;

use thiserror::Error;

/// Failures of a single backup run, plus the cron parse failure raised at startup.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid hex length {0}: must be a positive even number")]
    InvalidLength(usize),

    #[error("Secure random source failed: {0}")]
    RandomSource(#[from] rand::Error),

    #[error("Failed to spawn {program}: {reason}")]
    ProcessSpawn { program: String, reason: String },

    #[error("Dump command failed with {status}: {stderr}")]
    ProcessExecution { status: ExitStatus, stderr: String },

    #[error("Archive write failed: {0}")]
    ArchiveWrite(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
}

impl BackupError {
    /// Pipeline stage the error belongs to, used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            BackupError::InvalidLength(_) | BackupError::RandomSource(_) => "naming",
            BackupError::ProcessSpawn { .. } | BackupError::ProcessExecution { .. } => "dump",
            BackupError::ArchiveWrite(_) => "archive",
            BackupError::Upload(_) => "upload",
            BackupError::InvalidCron { .. } => "schedule",
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(BackupError::InvalidLength(3).stage(), "naming");
        assert_eq!(BackupError::ArchiveWrite("x".into()).stage(), "archive");
        assert_eq!(BackupError::Upload("x".into()).stage(), "upload");
        assert_eq!(
            BackupError::ProcessSpawn { program: "pg_dump".into(), reason: "missing".into() }.stage(),
            "dump"
        );
    }

    #[test]
    fn test_invalid_length_message() {
        let msg = BackupError::InvalidLength(31).to_string();
        assert!(msg.contains("31"));
    }
}
