// src/backup/logic.rs
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use super::archive::{ARCHIVE_CONTENT_TYPE, create_zip_archive};
use super::db_dump::Dumper;
use super::naming::build_object_key;
use super::s3_upload::ObjectUploader;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::utils::random::{TOKEN_HEX_LEN, generate_random_hex};

/// What one successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub key: String,
    pub archive_len: usize,
}

/// The dump → archive → upload pipeline, with its dependencies captured once at startup.
pub struct BackupJob {
    config: Arc<AppConfig>,
    dumper: Box<dyn Dumper>,
    uploader: Box<dyn ObjectUploader>,
}

impl BackupJob {
    pub fn new(config: Arc<AppConfig>, dumper: Box<dyn Dumper>, uploader: Box<dyn ObjectUploader>) -> Self {
        Self {
            config,
            dumper,
            uploader,
        }
    }

    /// Runs the pipeline once and logs the result. Errors end this run only.
    pub async fn run_once(&self) -> Option<BackupOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("backup_run", %run_id);

        async {
            match self.execute(Utc::now().date_naive()).await {
                Ok(outcome) => {
                    info!(
                        "✅ Backup complete: {} ({} bytes)",
                        outcome.key, outcome.archive_len
                    );
                    Some(outcome)
                }
                Err(e) => {
                    error!(stage = e.stage(), "❌ Backup run aborted: {}", e);
                    None
                }
            }
        }
        .instrument(span)
        .await
    }

    /// One pass of the pipeline for the given date, stopping at the first failing stage.
    pub async fn execute(&self, date: NaiveDate) -> Result<BackupOutcome> {
        info!("Starting to dump pgsql...");
        let dump = self.dumper.dump().await?;
        info!("pg_dump produced {} bytes", dump.len());

        let archive = create_zip_archive(&dump)?;
        drop(dump);
        info!("pgsql dumped successfully...");

        let token = generate_random_hex(TOKEN_HEX_LEN)?;
        let key = build_object_key(date, &token);
        info!("File name: {}", key);

        let archive_len = archive.len();
        self.uploader
            .upload(
                &self.config.storage.bucket_name,
                &key,
                archive,
                archive_len as i64,
                ARCHIVE_CONTENT_TYPE,
            )
            .await?;
        info!("Uploaded the file to S3");

        Ok(BackupOutcome { key, archive_len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::{DUMP_ENTRY_NAME, read_zip_entry};
    use crate::backup::db_dump::MockDumper;
    use crate::backup::s3_upload::MockObjectUploader;
    use crate::config::test_config;
    use crate::errors::BackupError;
    use std::sync::Mutex;

    type Upload = (String, String, Vec<u8>, i64, String);

    fn march_7() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    fn job(dumper: MockDumper, uploader: MockObjectUploader) -> BackupJob {
        BackupJob::new(Arc::new(test_config()), Box::new(dumper), Box::new(uploader))
    }

    #[cfg(unix)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_dump_skips_upload() {
        let mut dumper = MockDumper::new();
        dumper.expect_dump().times(1).returning(|| {
            Err(BackupError::ProcessExecution {
                status: exit_status(1),
                stderr: String::new(),
            })
        });
        let mut uploader = MockObjectUploader::new();
        uploader.expect_upload().never();

        let job = job(dumper, uploader);
        let result = job.execute(march_7()).await;

        assert!(matches!(result, Err(BackupError::ProcessExecution { .. })));
    }

    #[tokio::test]
    async fn test_successful_run_uploads_archive() {
        let captured: Arc<Mutex<Option<Upload>>> = Arc::new(Mutex::new(None));

        let mut dumper = MockDumper::new();
        dumper.expect_dump().times(1).returning(|| Ok(b"SELECT 1;".to_vec()));

        let mut uploader = MockObjectUploader::new();
        let sink = Arc::clone(&captured);
        uploader
            .expect_upload()
            .times(1)
            .returning(move |bucket, key, body, len, content_type| {
                *sink.lock().unwrap() = Some((
                    bucket.to_string(),
                    key.to_string(),
                    body,
                    len,
                    content_type.to_string(),
                ));
                Ok(())
            });

        let job = job(dumper, uploader);
        let outcome = job.execute(march_7()).await.unwrap();

        let (bucket, key, body, len, content_type) = captured.lock().unwrap().take().unwrap();
        assert_eq!(bucket, "backups");
        assert_eq!(key, outcome.key);
        assert_eq!(len as usize, body.len());
        assert_eq!(content_type, "application/zip");
        assert_eq!(outcome.archive_len, body.len());
        assert_eq!(read_zip_entry(&body, DUMP_ENTRY_NAME).unwrap(), b"SELECT 1;");

        assert!(key.starts_with("Database/2024/3/7/2024-03-07 ("));
        assert!(key.ends_with(").zip"));
        let token = &key["Database/2024/3/7/2024-03-07 (".len()..key.len() - ").zip".len()];
        assert_eq!(token.len(), TOKEN_HEX_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn test_upload_error_is_contained_and_next_run_proceeds() {
        let mut dumper = MockDumper::new();
        dumper.expect_dump().times(2).returning(|| Ok(b"SELECT 1;".to_vec()));

        let mut uploader = MockObjectUploader::new();
        let mut calls = 0;
        uploader.expect_upload().times(2).returning(move |_, _, _, _, _| {
            calls += 1;
            if calls == 1 {
                Err(BackupError::Upload("dispatch failure: connection refused".to_string()))
            } else {
                Ok(())
            }
        });

        let job = job(dumper, uploader);

        assert_eq!(job.run_once().await, None);
        let second = job.run_once().await.expect("second run should succeed");
        assert!(second.key.starts_with("Database/"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dump_error_is_contained_and_next_run_proceeds() {
        let mut dumper = MockDumper::new();
        let mut calls = 0;
        dumper.expect_dump().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Err(BackupError::ProcessExecution {
                    status: exit_status(1),
                    stderr: "pg_dump: error: connection to server failed".to_string(),
                })
            } else {
                Ok(b"SELECT 1;".to_vec())
            }
        });

        let mut uploader = MockObjectUploader::new();
        uploader.expect_upload().times(1).returning(|_, _, _, _, _| Ok(()));

        let job = job(dumper, uploader);

        assert_eq!(job.run_once().await, None);
        let second = job.run_once().await.expect("second run should succeed");
        assert!(second.key.starts_with("Database/"));
    }

    #[tokio::test]
    async fn test_each_run_uses_a_fresh_token() {
        let mut dumper = MockDumper::new();
        dumper.expect_dump().times(2).returning(|| Ok(Vec::new()));
        let mut uploader = MockObjectUploader::new();
        uploader.expect_upload().times(2).returning(|_, _, _, _, _| Ok(()));

        let job = job(dumper, uploader);
        let first = job.execute(march_7()).await.unwrap();
        let second = job.execute(march_7()).await.unwrap();

        assert_ne!(first.key, second.key);
    }
}
