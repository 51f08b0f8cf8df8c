use thiserror::Error;

use super::orchestrator::RunStatus;

/// Conditions that abort a run. Row-level failures never surface here.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("unknown table `{key}` (known: {known})")]
    UnknownTable { key: String, known: String },
    #[error("no repository for {label}; tried {}", tried.join(", "))]
    RepoNotFound { label: String, tried: Vec<String> },
    #[error("a migration run is already in progress")]
    RunInProgress { status: Box<RunStatus> },
    #[error("invalid request field `{field}`: {message}")]
    InvalidRequest { field: String, message: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl MigrationError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        MigrationError::InvalidRequest {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
