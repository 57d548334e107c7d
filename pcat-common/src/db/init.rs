//! Database initialization
//!
//! Opens (or creates) the catalog database and brings every catalog table
//! up to date with the entity field maps.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every connection
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection options apply per connection, so every pooled connection
    // enforces foreign keys and shares the same busy timeout.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_catalog_tables(&pool).await?;

    Ok(pool)
}

/// Create missing catalog tables and add missing columns
///
/// Idempotent; also used by tests running against in-memory pools.
pub async fn create_catalog_tables(pool: &SqlitePool) -> Result<()> {
    crate::db::schema_sync::sync_all_tables(pool).await
}
