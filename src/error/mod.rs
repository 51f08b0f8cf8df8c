use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use anyhow::Error as AnyhowError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use sqlx::Error as SqlxError;
use std::io::Error as IoError;

use crate::migration::MigrationError;

/// A structured error that can be serialized and handed to whoever invoked the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    /// Machine readable error code.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
    /// Optional nested cause that preserves the error chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<AppError>>,
}

impl AppError {
    pub const UNKNOWN_CODE: &'static str = "APP/UNKNOWN";

    pub const UNKNOWN_TABLE: &'static str = "MIGRATION/UNKNOWN_TABLE";
    pub const REPO_NOT_FOUND: &'static str = "MIGRATION/REPO_NOT_FOUND";
    pub const RUN_IN_PROGRESS: &'static str = "MIGRATION/RUN_IN_PROGRESS";
    pub const INVALID_REQUEST: &'static str = "MIGRATION/INVALID_REQUEST";
    pub const DATABASE: &'static str = "MIGRATION/DATABASE";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            let mut keys: Vec<_> = self.context.iter().collect();
            keys.sort();
            write!(f, "[{}] {} ({:?})", self.code, self.message, keys)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<AnyhowError> for AppError {
    fn from(error: AnyhowError) -> Self {
        fn convert(err: &(dyn StdError + 'static)) -> AppError {
            if let Some(app) = err.downcast_ref::<AppError>() {
                return app.clone();
            }
            if let Some(migration) = err.downcast_ref::<MigrationError>() {
                return describe_migration(migration);
            }
            if let Some(io) = err.downcast_ref::<IoError>() {
                return describe_io(io);
            }
            if let Some(json) = err.downcast_ref::<SerdeJsonError>() {
                return describe_json(json);
            }
            if let Some(sqlx) = err.downcast_ref::<SqlxError>() {
                return describe_sqlx(sqlx);
            }

            let mut root = AppError::new(AppError::UNKNOWN_CODE, err.to_string());
            if let Some(source) = err.source() {
                root.cause = Some(Box::new(convert(source)));
            }
            root
        }

        convert(error.as_ref())
    }
}

fn describe_io(error: &IoError) -> AppError {
    let code = format!("IO/{:?}", error.kind());
    let mut app_error = AppError::new(code, error.to_string());
    if let Some(os_code) = error.raw_os_error() {
        app_error = app_error.with_context("os_code", os_code.to_string());
    }
    app_error
}

fn describe_json(error: &SerdeJsonError) -> AppError {
    let code = if error.is_data() {
        "JSON/DATA"
    } else if error.is_syntax() {
        "JSON/SYNTAX"
    } else if error.is_eof() {
        "JSON/EOF"
    } else {
        "JSON/ERROR"
    };
    let mut app_error = AppError::new(code, error.to_string());
    if error.line() > 0 {
        app_error = app_error
            .with_context("line", error.line().to_string())
            .with_context("column", error.column().to_string());
    }
    app_error
}

fn describe_sqlx(error: &SqlxError) -> AppError {
    match error {
        SqlxError::RowNotFound => AppError::new("SQLX/ROW_NOT_FOUND", "Record not found"),
        SqlxError::PoolTimedOut => AppError::new(
            "SQLX/POOL_TIMEOUT",
            "Timed out acquiring a database connection",
        ),
        SqlxError::PoolClosed => AppError::new("SQLX/POOL_CLOSED", "Database pool is closed"),
        SqlxError::Io(err) => describe_io(err).with_context("source", "sqlx"),
        SqlxError::Database(db) => {
            let code = db
                .code()
                .map(|code| format!("Sqlite/{code}"))
                .unwrap_or_else(|| "SQLX/DATABASE".to_string());
            let mut app_error = AppError::new(code, db.message().to_string());
            if let Some(constraint) = db.constraint() {
                app_error = app_error.with_context("constraint", constraint.to_string());
            }
            app_error
        }
        other => AppError::new("SQLX/ERROR", other.to_string()),
    }
}

fn describe_migration(error: &MigrationError) -> AppError {
    match error {
        MigrationError::UnknownTable { key, known } => {
            AppError::new(AppError::UNKNOWN_TABLE, error.to_string())
                .with_context("table", key.clone())
                .with_context("known", known.clone())
        }
        MigrationError::RepoNotFound { label, tried } => {
            AppError::new(AppError::REPO_NOT_FOUND, error.to_string())
                .with_context("label", label.clone())
                .with_context("tried", tried.join(","))
        }
        MigrationError::RunInProgress { status } => {
            let mut app_error = AppError::new(AppError::RUN_IN_PROGRESS, error.to_string());
            if let Ok(json) = serde_json::to_string(status) {
                app_error = app_error.with_context("status", json);
            }
            app_error
        }
        MigrationError::InvalidRequest { field, message } => {
            AppError::new(AppError::INVALID_REQUEST, message.clone()).with_context("field", field.clone())
        }
        MigrationError::Database(db) => {
            let mut app_error = AppError::new(AppError::DATABASE, "Store query failed");
            app_error.cause = Some(Box::new(describe_sqlx(db)));
            app_error
        }
    }
}

impl From<MigrationError> for AppError {
    fn from(error: MigrationError) -> Self {
        describe_migration(&error)
    }
}
