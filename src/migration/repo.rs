use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, Column, Row, SqlitePool, TypeInfo, ValueRef};
use thiserror::Error;

use super::identity::LegacyKey;
use super::pager::ChunkQuery;

/// One row as a column map.
pub type Record = Map<String, Value>;

/// Row-level store failure. Never aborts a table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("no record matched id {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::Database(db) => StoreError::Other(db.message().to_string()),
            other => StoreError::Other(other.to_string()),
        }
    }
}

/// Read side of a legacy table.
#[async_trait]
pub trait LegacyRepo: Send + Sync {
    /// Physical table this repo reads.
    fn name(&self) -> &str;

    async fn find_chunk(&self, query: &ChunkQuery) -> Result<Vec<Record>, sqlx::Error>;

    /// First row (lowest `id`) where any of `columns` equals `value`.
    /// Columns the table lacks are skipped.
    async fn find_by_any(
        &self,
        columns: &[&str],
        value: &Value,
    ) -> Result<Option<Record>, sqlx::Error>;
}

/// Write side of a target table.
#[async_trait]
pub trait TargetRepo: Send + Sync {
    fn name(&self) -> &str;

    /// Inserts a record; duplicates surface as [`StoreError::UniqueViolation`].
    async fn create(&self, data: &Record) -> Result<(), StoreError>;

    /// Updates the record whose `id` equals `id`.
    async fn update(&self, id: &Value, data: &Record) -> Result<(), StoreError>;

    /// Looks up a record by a unique column (`id`, `email`, ...).
    async fn find_unique(&self, column: &str, value: &Value) -> Result<Option<Record>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct SqliteLegacyRepo {
    pool: SqlitePool,
    table: String,
}

impl SqliteLegacyRepo {
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl LegacyRepo for SqliteLegacyRepo {
    fn name(&self) -> &str {
        &self.table
    }

    async fn find_chunk(&self, query: &ChunkQuery) -> Result<Vec<Record>, sqlx::Error> {
        let sql = query.to_sql(&quote_ident(&self.table));
        let mut q = sqlx::query(&sql);
        if let Some(after) = &query.after {
            q = match after {
                LegacyKey::Int(v) => q.bind(*v),
                LegacyKey::Text(s) => q.bind(s.clone()),
            };
        }
        let rows = q.bind(i64::from(query.limit)).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(row_to_record).collect())
    }

    async fn find_by_any(
        &self,
        columns: &[&str],
        value: &Value,
    ) -> Result<Option<Record>, sqlx::Error> {
        let present: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
            .bind(self.table.as_str())
            .fetch_all(&self.pool)
            .await?;
        let wanted: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| present.iter().any(|p| p == c))
            .collect();
        if wanted.is_empty() {
            return Ok(None);
        }
        let predicate = wanted
            .iter()
            .map(|c| format!("{} = ?1", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" OR ");
        let order = if present.iter().any(|p| p == "id") {
            " ORDER BY \"id\" ASC"
        } else {
            ""
        };
        let sql = format!(
            "SELECT * FROM {} WHERE {predicate}{order} LIMIT 1",
            quote_ident(&self.table)
        );
        let row = bind_value(sqlx::query(&sql), value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_record))
    }
}

#[derive(Debug, Clone)]
pub struct SqliteTargetRepo {
    pool: SqlitePool,
    table: String,
}

impl SqliteTargetRepo {
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl TargetRepo for SqliteTargetRepo {
    fn name(&self) -> &str {
        &self.table
    }

    async fn create(&self, data: &Record) -> Result<(), StoreError> {
        let cols: Vec<&String> = data.keys().collect();
        let placeholders: Vec<&str> = cols.iter().map(|_| "?").collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table),
            cols.iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            placeholders.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for value in data.values() {
            query = bind_value(query, value);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn update(&self, id: &Value, data: &Record) -> Result<(), StoreError> {
        let cols: Vec<&String> = data.keys().filter(|k| k.as_str() != "id").collect();
        if cols.is_empty() {
            return Ok(());
        }
        let set_clause: Vec<String> = cols
            .iter()
            .map(|c| format!("{} = ?", quote_ident(c)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE \"id\" = ?",
            quote_ident(&self.table),
            set_clause.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for c in &cols {
            if let Some(value) = data.get(c.as_str()) {
                query = bind_value(query, value);
            }
        }
        query = bind_value(query, id);
        let res = query.execute(&self.pool).await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(display_value(id)));
        }
        Ok(())
    }

    async fn find_unique(&self, column: &str, value: &Value) -> Result<Option<Record>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 LIMIT 1",
            quote_ident(&self.table),
            quote_ident(column)
        );
        let row = bind_value(sqlx::query(&sql), value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_record))
    }
}

/// Whether a table or view named `name` exists on the store.
pub async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

fn row_to_record(row: SqliteRow) -> Record {
    let mut map = Map::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let val = match row.try_get_raw(idx).ok() {
            Some(raw) if raw.is_null() => Value::Null,
            Some(raw) => match raw.type_info().name() {
                "INTEGER" => row
                    .try_get::<i64, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                "REAL" => row
                    .try_get::<f64, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
                _ => row
                    .try_get::<String, _>(idx)
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            },
            None => Value::Null,
        };
        map.insert(col.name().to_string(), val);
    }
    map
}

fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    v: &Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match v {
        Value::Null => q.bind(Option::<i64>::None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(Option::<i64>::None)
            }
        }
        Value::Bool(b) => q.bind(*b as i64),
        Value::String(s) => q.bind(s.clone()),
        _ => q.bind(v.to_string()),
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect sqlite::memory:");
        sqlx::query(
            "CREATE TABLE admins (id TEXT PRIMARY KEY, name TEXT, email TEXT UNIQUE, score REAL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_then_duplicate_reports_unique_violation() {
        let repo = SqliteTargetRepo::new(pool().await, "admins");
        let row = record(json!({"id": "a", "name": "Ann", "email": "ann@example.com"}));
        repo.create(&row).await.unwrap();
        let err = repo.create(&row).await.unwrap_err();
        assert!(err.is_unique_violation(), "{err:?}");
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let repo = SqliteTargetRepo::new(pool().await, "admins");
        let err = repo
            .update(&json!("nope"), &record(json!({"name": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn find_unique_reads_back_typed_columns() {
        let repo = SqliteTargetRepo::new(pool().await, "admins");
        repo.create(&record(
            json!({"id": "a", "name": "Ann", "email": "ann@example.com", "score": 1.5}),
        ))
        .await
        .unwrap();
        let found = repo
            .find_unique("email", &json!("ann@example.com"))
            .await
            .unwrap()
            .expect("row present");
        assert_eq!(found.get("id"), Some(&json!("a")));
        assert_eq!(found.get("score"), Some(&json!(1.5)));
        assert!(repo
            .find_unique("email", &json!("bob@example.com"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn legacy_chunks_are_keyset_paginated() {
        let pool = pool().await;
        sqlx::query("CREATE TABLE industries (id INTEGER PRIMARY KEY, title TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        for id in 1..=5 {
            sqlx::query("INSERT INTO industries (id, title) VALUES (?1, 't')")
                .bind(id)
                .execute(&pool)
                .await
                .unwrap();
        }
        let repo = SqliteLegacyRepo::new(pool.clone(), "industries");
        let first = repo.find_chunk(&ChunkQuery::new(2, None)).await.unwrap();
        assert_eq!(
            first.iter().map(|r| r["id"].clone()).collect::<Vec<_>>(),
            vec![json!(1), json!(2)]
        );
        let next = repo
            .find_chunk(&ChunkQuery::new(10, Some(LegacyKey::Int(2))))
            .await
            .unwrap();
        assert_eq!(
            next.iter().map(|r| r["id"].clone()).collect::<Vec<_>>(),
            vec![json!(3), json!(4), json!(5)]
        );
        assert!(table_exists(&pool, "industries").await.unwrap());
        assert!(!table_exists(&pool, "job_industries").await.unwrap());
    }

    #[tokio::test]
    async fn legacy_lookup_matches_any_present_alias_column() {
        let pool = pool().await;
        sqlx::query("CREATE TABLE candidates (id INTEGER PRIMARY KEY, uuid TEXT, email TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO candidates VALUES (7, 'c-7', 'x@example.com'), (8, 'c-8', NULL)")
            .execute(&pool)
            .await
            .unwrap();
        let repo = SqliteLegacyRepo::new(pool, "candidates");
        let aliases = ["id", "uuid", "external_id"];

        let by_uuid = repo.find_by_any(&aliases, &json!("c-8")).await.unwrap();
        assert_eq!(by_uuid.unwrap()["id"], json!(8));
        // text keys compare against integer ids by column affinity
        let by_id = repo.find_by_any(&aliases, &json!("7")).await.unwrap();
        assert_eq!(by_id.unwrap()["uuid"], json!("c-7"));
        assert!(repo.find_by_any(&aliases, &json!("c-9")).await.unwrap().is_none());
        assert!(repo
            .find_by_any(&["external_id"], &json!("c-7"))
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
