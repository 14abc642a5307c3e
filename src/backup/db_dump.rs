// src/backup/db_dump.rs
use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::errors::{BackupError, Result};
use crate::utils::find_executable;

/// Produces the raw bytes of one database dump.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dumper: Send + Sync {
    async fn dump(&self) -> Result<Vec<u8>>;
}

/// Runs `pg_dump -U <user> -h <host> -p <port>` and captures its stdout.
#[derive(Debug, Clone)]
pub struct PgDump {
    program: String,
    host: String,
    port: u16,
    username: String,
    password: Option<String>,
    database: Option<String>,
}

impl PgDump {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            program: config.pg_dump_bin.clone(),
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command line arguments, without the program name.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-U".to_string(),
            self.username.clone(),
            "-h".to_string(),
            self.host.clone(),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(db) = &self.database {
            args.push("-d".to_string());
            args.push(db.clone());
        }
        args
    }
}

#[async_trait]
impl Dumper for PgDump {
    async fn dump(&self) -> Result<Vec<u8>> {
        let pg_dump_path = find_executable(self.program())?;
        debug!("Found {} executable at: {}", self.program(), pg_dump_path.display());

        let mut command = Command::new(&pg_dump_path);
        command
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(password) = &self.password {
            command.env("PGPASSWORD", password);
        }

        let output = command.output().await.map_err(|e| BackupError::ProcessSpawn {
            program: pg_dump_path.display().to_string(),
            reason: e.to_string(),
        })?;

        check_output(output)
    }
}

/// Accepts the dump only when the process exited cleanly and wrote nothing to stderr.
fn check_output(output: Output) -> Result<Vec<u8>> {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() || !stderr.is_empty() {
        return Err(BackupError::ProcessExecution {
            status: output.status,
            stderr,
        });
    }

    Ok(output.stdout)
}
