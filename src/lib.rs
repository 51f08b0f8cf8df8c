//! Chunked, resumable migration from a legacy SQLite store into a redesigned target store.

pub mod config;
pub mod db;
mod error;
pub mod logging;
pub mod migration;

pub use error::AppError;
pub use migration::{
    MigrationError, MigrationReport, MigrationRequest, Migrator, ModelRegistry, RunStatus,
    TableName,
};
