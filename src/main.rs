//! Scheduled PostgreSQL backups
//!
//! Dumps a database with pg_dump on a cron schedule, zips the dump in memory
//! and uploads it to S3-compatible object storage.

// src/main.rs
mod backup;
mod config;
mod errors;
mod scheduler;
mod utils;

use anyhow::{Context, Result};
use config::AppConfig;
use scheduler::CronScheduler;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entry point for the backup daemon
#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run_app().await {
        Ok(_) => {
            info!("Shutting down.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .init();
}

async fn run_app() -> Result<()> {
    // Optional first argument: path to the env file. Defaults to ./.env.
    let env_file = env::args().nth(1).map(PathBuf::from);
    let app_config = Arc::new(
        AppConfig::load(env_file.as_deref()).context("Failed to load application configuration")?,
    );

    let scheduler = CronScheduler::new(&app_config.cron_expression)
        .context("Failed to parse CRON_JOB")?;

    let job = Arc::new(
        backup::build_backup_job(Arc::clone(&app_config))
            .await
            .context("Failed to construct object storage client")?,
    );

    info!("pgsql will be dumped every {}", scheduler.expression());
    if let Some(next) = scheduler.next_after(chrono::Utc::now()) {
        info!("First backup scheduled for {}", next);
    }

    let mut trigger_loop = scheduler.start(move || {
        let job = Arc::clone(&job);
        async move {
            job.run_once().await;
        }
    });

    tokio::select! {
        joined = &mut trigger_loop => {
            match joined {
                Ok(()) => warn!("Scheduler loop ended: no further occurrences"),
                Err(e) => anyhow::bail!("Scheduler loop crashed: {}", e),
            }
        }
        signal = shutdown_signal() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping scheduler");
            trigger_loop.abort();
        }
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
