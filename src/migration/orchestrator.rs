use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cancel::CancellationToken;
use super::deps::processing_order;
use super::identity::LegacyKey;
use super::migrators::{migrate_table, RunContext};
use super::registry::ModelRegistry;
use super::report::{MigrationReport, TableReport};
use super::request::MigrationRequest;
use super::table::TableName;
use super::MigrationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCursor {
    pub table: TableName,
    pub cursor: Option<LegacyKey>,
}

/// Pollable progress of the current (or last) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub running: bool,
    pub current_table: Option<TableName>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_cursor: Option<LastCursor>,
}

fn lock(status: &Mutex<RunStatus>) -> std::sync::MutexGuard<'_, RunStatus> {
    status.lock().unwrap_or_else(|e| e.into_inner())
}

/// Holds the single-flight slot; releasing it on drop covers every exit path.
struct RunGuard {
    status: Arc<Mutex<RunStatus>>,
}

impl RunGuard {
    fn begin(status: Arc<Mutex<RunStatus>>, started_at: DateTime<Utc>) -> Result<Self, MigrationError> {
        {
            let mut current = lock(&status);
            if current.running {
                return Err(MigrationError::RunInProgress {
                    status: Box::new(current.clone()),
                });
            }
            *current = RunStatus {
                running: true,
                current_table: None,
                started_at: Some(started_at),
                last_cursor: None,
            };
        }
        Ok(Self { status })
    }

    fn enter(&self, table: TableName) {
        lock(&self.status).current_table = Some(table);
    }

    fn record_cursor(&self, table: TableName, cursor: Option<LegacyKey>) {
        lock(&self.status).last_cursor = Some(LastCursor { table, cursor });
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut status = lock(&self.status);
        status.running = false;
        status.current_table = None;
    }
}

/// Runs migrations against one registry, one at a time.
pub struct Migrator {
    registry: ModelRegistry,
    status: Arc<Mutex<RunStatus>>,
    cancel: CancellationToken,
}

impl Migrator {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            status: Arc::new(Mutex::new(RunStatus::default())),
            cancel: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn status(&self) -> RunStatus {
        lock(&self.status).clone()
    }

    /// Token that stops the current run between rows when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Processes one chunk of every requested table (dependencies included).
    pub async fn run(&self, request: &MigrationRequest) -> Result<MigrationReport, MigrationError> {
        let resolved = request.resolve().and_then(|resolved| {
            let started_at = Utc::now();
            RunGuard::begin(self.status.clone(), started_at).map(|guard| (resolved, guard, started_at))
        });
        let (resolved, guard, started_at) = match resolved {
            Ok(parts) => parts,
            Err(err) => {
                tracing::warn!(target: "cutover", event = "migration_run_rejected", error = %err);
                return Err(err);
            }
        };
        self.cancel.reset();
        let order = processing_order(&resolved.tables);
        tracing::info!(
            target: "cutover",
            event = "migration_run_start",
            dry_run = resolved.dry_run,
            limit = resolved.limit,
            tables = ?order.iter().map(|t| t.as_str()).collect::<Vec<_>>()
        );

        let mut run = RunContext::new(&self.registry, &self.cancel, resolved.dry_run, resolved.limit);
        let mut tables = Vec::with_capacity(order.len());
        let mut cancelled = false;
        for table in order {
            if run.is_cancelled() {
                cancelled = true;
                break;
            }
            guard.enter(table);
            let outcome = migrate_table(&mut run, table, resolved.cursor(table)).await?;
            let report = outcome.report;
            tracing::info!(
                target: "cutover",
                event = "migration_table_done",
                table = table.as_str(),
                read = report.read,
                written = report.written,
                planned = report.planned,
                conflicts = report.conflicts.len(),
                missing_links = report.missing_links.len(),
                errors = report.errors.len(),
                has_more = report.has_more
            );
            guard.record_cursor(table, report.next_cursor.clone());
            tables.push(report);
            if outcome.cancelled {
                cancelled = true;
                break;
            }
        }

        let report = MigrationReport::assemble(resolved.dry_run, started_at, tables, cancelled);
        if cancelled {
            tracing::warn!(
                target: "cutover",
                event = "migration_run_cancelled",
                tables_done = report.tables.len()
            );
        }
        tracing::info!(
            target: "cutover",
            event = "migration_run_done",
            duration_ms = report.duration_ms,
            total_read = report.summary.total_read,
            total_written = report.summary.total_written,
            total_planned = report.summary.total_planned,
            total_errors = report.summary.total_errors
        );
        drop(guard);
        Ok(report)
    }

    /// Runs `table_key` (and whatever it depends on) with the rest of `request`.
    pub async fn run_table(
        &self,
        table_key: &str,
        request: &MigrationRequest,
    ) -> Result<MigrationReport, MigrationError> {
        let table = TableName::parse(table_key)?;
        let request = MigrationRequest {
            tables: Some(vec![table.as_str().to_string()]),
            ..request.clone()
        };
        self.run(&request).await
    }

    /// Repeats `run`, feeding cursors back, until every table is drained,
    /// the run is cancelled, or `max_chunks` runs have happened.
    ///
    /// A table joins a chunk only once every table it links to is drained,
    /// so its links always find their targets already written.
    pub async fn run_until_drained(
        &self,
        request: &MigrationRequest,
        max_chunks: usize,
    ) -> Result<Vec<MigrationReport>, MigrationError> {
        let order = processing_order(&request.resolve()?.tables);
        let mut drained: BTreeSet<TableName> = BTreeSet::new();
        let mut reports = Vec::new();
        let mut next = request.clone();
        for chunk in 0..max_chunks {
            if chunk > 0 && self.cancel.is_cancelled() {
                break;
            }
            let ready = ready_tables(&order, &drained);
            next.tables = Some(ready.iter().map(|t| t.as_str().to_string()).collect());
            let report = self.run(&next).await?;
            for table in &ready {
                if report.table(*table).is_some_and(TableReport::is_drained) {
                    drained.insert(*table);
                }
            }
            let cancelled = report.cancelled;
            next = next.with_cursors(&report.cursors);
            reports.push(report);
            if cancelled || drained.len() == order.len() {
                break;
            }
            tracing::debug!(
                target: "cutover",
                event = "migration_drain_continue",
                chunk = chunk + 1,
                drained = drained.len(),
                pending = order.len() - drained.len()
            );
        }
        Ok(reports)
    }
}

/// Undrained tables whose dependencies are all drained.
fn ready_tables(order: &[TableName], drained: &BTreeSet<TableName>) -> Vec<TableName> {
    order
        .iter()
        .copied()
        .filter(|t| !drained.contains(t))
        .filter(|t| t.dependencies().iter().all(|dep| drained.contains(dep)))
        .collect()
}
