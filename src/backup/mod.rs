// src/backup/mod.rs
pub(crate) mod archive; // Single-entry zip creation
pub(crate) mod db_dump; // pg_dump invocation
pub(crate) mod logic; // The scheduled job body
pub(crate) mod naming; // Object key layout
pub(crate) mod s3_upload; // S3 interactions

use anyhow::Result;
use std::sync::Arc;

use crate::config::AppConfig;
use db_dump::PgDump;
use s3_upload::S3Uploader;

pub use logic::BackupJob;

/// Wires the real pg_dump invoker and S3 uploader into a job.
/// Fails only when the storage client cannot be constructed.
pub async fn build_backup_job(app_config: Arc<AppConfig>) -> Result<BackupJob> {
    let dumper = PgDump::new(&app_config.database);
    let uploader = S3Uploader::new(&app_config.storage).await?;

    Ok(BackupJob::new(app_config, Box::new(dumper), Box::new(uploader)))
}
