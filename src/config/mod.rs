// src/config/mod.rs
use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

const DEFAULT_ENV_FILE: &str = ".env";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_PG_DUMP: &str = "pg_dump";

/// Object storage connection settings.
#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub use_ssl: bool,
    pub bucket_name: String,
    pub region: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .finish()
    }
}

/// Connection parameters handed to pg_dump.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub database: Option<String>,
    pub pg_dump_bin: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("pg_dump_bin", &self.pg_dump_bin)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub cron_expression: String,
}

impl AppConfig {
    /// Loads the `.env` file (default `./.env`) into the process environment,
    /// then reads the configuration from it.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let env_path = env_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE));

        dotenv::from_path(&env_path)
            .with_context(|| format!("Error loading .env file at {}", env_path.display()))?;

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{} must be set in the environment or .env file", key))
        };
        let optional = |key: &str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let storage = StorageConfig {
            endpoint: required("S3_ENDPOINT")?,
            access_key_id: required("S3_ACCESS")?,
            secret_access_key: required("S3_SECRET")?,
            use_ssl: optional("S3_USE_SSL").as_deref() == Some("true"),
            bucket_name: required("S3_BUCKET")?,
            region: optional("S3_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
        };

        let port_raw = required("PGPORT")?;
        let port = port_raw
            .parse::<u16>()
            .with_context(|| format!("PGPORT must be a valid port number, got '{}'", port_raw))?;

        let database = DatabaseConfig {
            host: required("PGHOST")?,
            port,
            username: required("PGUSERNAME")?,
            password: optional("PGPASSWORD"),
            database: optional("PGDATABASE"),
            pg_dump_bin: optional("PG_DUMP_BIN").unwrap_or_else(|| DEFAULT_PG_DUMP.to_string()),
        };

        Ok(AppConfig {
            storage,
            database,
            cron_expression: required("CRON_JOB")?,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        storage: StorageConfig {
            endpoint: "localhost:9000".to_string(),
            access_key_id: "minio".to_string(),
            secret_access_key: "minio-secret".to_string(),
            use_ssl: false,
            bucket_name: "backups".to_string(),
            region: DEFAULT_REGION.to_string(),
        },
        database: DatabaseConfig {
            host: "db.internal".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: None,
            database: None,
            pg_dump_bin: DEFAULT_PG_DUMP.to_string(),
        },
        cron_expression: "0 3 * * *".to_string(),
    }
}
