pub mod random;

use std::path::PathBuf;

use which::which;

use crate::errors::{BackupError, Result};

/// Finds an executable such as pg_dump in the system PATH.
pub fn find_executable(program: &str) -> Result<PathBuf> {
    which(program).map_err(|e| BackupError::ProcessSpawn {
        program: program.to_string(),
        reason: format!(
            "executable not found in PATH ({}). Please ensure PostgreSQL client tools are installed and in your PATH.",
            e
        ),
    })
}
