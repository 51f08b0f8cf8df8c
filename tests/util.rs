#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::path::Path;

use cutover_lib::{Migrator, ModelRegistry};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

pub const LEGACY_SCHEMA: &str = include_str!("fixtures/legacy_schema.sql");
pub const TARGET_SCHEMA: &str = include_str!("fixtures/target_schema.sql");
pub const LEGACY_SEED: &str = include_str!("fixtures/legacy_seed.sql");

pub async fn temp_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    pool
}

pub async fn exec(pool: &SqlitePool, sql: &str) {
    sqlx::raw_sql(sql).execute(pool).await.expect("apply sql");
}

/// Legacy and target stores with every table created and nothing seeded.
pub async fn empty_stores() -> (SqlitePool, SqlitePool) {
    let legacy = temp_pool().await;
    exec(&legacy, LEGACY_SCHEMA).await;
    let target = temp_pool().await;
    exec(&target, TARGET_SCHEMA).await;
    (legacy, target)
}

/// Stores with the standard legacy fixture loaded.
pub async fn seeded_stores() -> (SqlitePool, SqlitePool) {
    let (legacy, target) = empty_stores().await;
    exec(&legacy, LEGACY_SEED).await;
    (legacy, target)
}

pub async fn migrator(legacy: &SqlitePool, target: &SqlitePool) -> Migrator {
    let registry = ModelRegistry::from_sqlite(legacy, target)
        .await
        .expect("registry resolves");
    Migrator::new(registry)
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn text_column(pool: &SqlitePool, table: &str, column: &str, id: &str) -> Option<String> {
    sqlx::query_scalar(&format!(
        "SELECT \"{column}\" FROM \"{table}\" WHERE id = ?1"
    ))
    .bind(id)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Creates a file-backed store and applies `sql`.
pub async fn file_store(path: &Path, sql: &[&str]) {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await.unwrap();
    for chunk in sql {
        exec(&pool, chunk).await;
    }
    pool.close().await;
}
