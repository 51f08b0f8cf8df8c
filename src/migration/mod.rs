//! Legacy to target store migration engine.
//!
//! Tables are processed one chunk at a time in a fixed dependency order. Each
//! row gets a deterministic target id, foreign keys are re-linked through
//! per-run identity maps, and every data problem is reported instead of
//! aborting the run.

pub mod cancel;
pub mod deps;
pub mod error;
pub mod identity;
pub mod migrators;
pub mod orchestrator;
pub mod pager;
pub mod registry;
pub mod report;
pub mod repo;
pub mod request;
pub mod rows;
pub mod table;

pub use cancel::CancellationToken;
pub use error::MigrationError;
pub use identity::{derive_id, IdentityMaps, LegacyKey, MappedEntity};
pub use orchestrator::{LastCursor, Migrator, RunStatus};
pub use registry::ModelRegistry;
pub use report::{
    write_run_report, ConflictEntry, LinkField, MigrationReport, MissingLinkEntry, ReportSummary,
    RowError, TableReport,
};
pub use repo::{LegacyRepo, Record, StoreError, TargetRepo};
pub use request::MigrationRequest;
pub use table::{TableKind, TableName, CANONICAL_ORDER};
