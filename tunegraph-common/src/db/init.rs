//! Database connection helpers
//!
//! - Graph database: opened read-write, created on first run, WAL mode
//! - Source database: opened read-only, must already exist
//! - Both: bounded connect retry for stores that come up after the service

use crate::config::ConnectSettings;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Open (creating if needed) a read-write database
pub async fn open_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // WAL lets recommendation reads proceed while a sync phase holds the writer.
    // Options apply to every pooled connection, not just the first one.
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    Ok(pool)
}

/// Open an existing database read-only
///
/// The source store is owned by other services; this subsystem never writes it.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!(
            "Database not found: {}",
            db_path.display()
        )));
    }

    // mode=ro: SQLite rejects every write on this connection
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .read_only(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Single-connection in-memory database (tests, dry runs)
pub async fn open_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    Ok(pool)
}

/// Run `connect` until it succeeds or `settings.max_attempts` is exhausted
///
/// Returns the last error when every attempt fails.
pub async fn connect_with_retry<F, Fut, T>(
    store_name: &str,
    settings: &ConnectSettings,
    mut connect: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = settings.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match connect().await {
            Ok(value) => {
                info!("Connected to {} after {} attempt(s)", store_name, attempt);
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                warn!(
                    "{} not ready (attempt {}/{}): {}",
                    store_name, attempt, max_attempts, e
                );
                tokio::time::sleep(settings.retry_delay()).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
