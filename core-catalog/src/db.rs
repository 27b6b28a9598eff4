//! SQLite pool for the catalog.
//!
//! The catalog runs in WAL mode so mirror workers can patch media references
//! while the walk keeps reading, and foreign keys are on so a `parent_id`
//! always names a stored entry. Migrations under `migrations/` are embedded
//! and applied every time a pool is opened.

use crate::{CatalogError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` opens a private in-memory database.
    pub path: Option<std::path::PathBuf>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    /// Each connection to `:memory:` is its own database, so this pool holds
    /// exactly one connection and never lets it go idle.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: None,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = match &self.path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            None => SqliteConnectOptions::from_str("sqlite::memory:")?,
        };
        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT))
    }
}

/// Open the pool and bring the schema up to date.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    let location = config
        .path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ":memory:".to_string());
    debug!(database = %location, max_connections = config.max_connections, "opening catalog");

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.path.as_ref().map(|_| Duration::from_secs(1800)))
        .connect_with(config.connect_options()?)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| CatalogError::Migration(e.to_string()))?;

    info!(database = %location, "catalog ready");
    Ok(pool)
}

/// In-memory pool with the schema applied.
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}
