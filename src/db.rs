use std::path::Path;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, SqlitePool};

/// Opens the legacy store. The engine only ever reads from it.
pub async fn open_legacy(path: &Path) -> Result<SqlitePool> {
    if !path.exists() {
        anyhow::bail!("legacy database not found: {}", path.display());
    }
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .log_statements(log::LevelFilter::Off);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(opts)
        .await
        .with_context(|| format!("open legacy {}", path.display()))?;
    log_effective_pragmas(&pool, "legacy").await;
    Ok(pool)
}

/// Opens the target store with the durability settings used for writes.
pub async fn open_target(path: &Path) -> Result<SqlitePool> {
    if !path.exists() {
        anyhow::bail!("target database not found: {}", path.display());
    }
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true)
        .busy_timeout(std::time::Duration::from_millis(5000))
        .log_statements(log::LevelFilter::Off);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(opts)
        .await
        .with_context(|| format!("open target {}", path.display()))?;
    log_effective_pragmas(&pool, "target").await;
    Ok(pool)
}

async fn log_effective_pragmas(pool: &SqlitePool, store: &str) {
    let jm: (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));
    let fks: (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .unwrap_or((i64::MIN,));

    tracing::info!(
        target: "cutover",
        event = "db_open",
        store,
        journal_mode = %jm.0,
        foreign_keys = %fks.0
    );
}
