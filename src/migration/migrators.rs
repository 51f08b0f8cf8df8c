//! Per-table migration of one chunk.
//!
//! Every table runs the same loop: fetch a page, drop soft-deleted rows, then
//! map, reconcile and write row by row. Tables differ only in how a row is
//! turned into a target record (see [`TableRun::prepare`]). Geography tables
//! keep their legacy keys and skip identity mapping altogether.

use std::fmt;

use serde_json::{json, Value};

use super::cancel::CancellationToken;
use super::identity::{derive_id, IdentityMaps, LegacyKey, MappedEntity};
use super::pager::ChunkQuery;
use super::registry::ModelRegistry;
use super::report::{ConflictEntry, LinkField, MissingLinkEntry, RowError, TableReport};
use super::repo::{Record, TargetRepo};
use super::rows::{
    self, AdminRecord, AdminRow, CandidateRecord, CandidateRow, DetailLinks, GeographyRecord,
    GeographyRow, IndustryRecord, IndustryRow, LegacyRow, OccupationRecord, OccupationRow,
    SkillRecord, SkillRow, WorkExpRecord, WorkExpRow,
};
use super::table::{TableKind, TableName};
use super::MigrationError;

pub const REASON_UPDATED: &str = "Duplicate existed; updated";
pub const REASON_EMAIL: &str = "Duplicate (email)";
pub const REASON_MISSING_ID: &str = "missing legacy id";

/// State shared by every table of one run.
pub struct RunContext<'a> {
    registry: &'a ModelRegistry,
    cancel: &'a CancellationToken,
    pub dry_run: bool,
    pub limit: u32,
    identity: IdentityMaps,
}

impl<'a> RunContext<'a> {
    pub fn new(
        registry: &'a ModelRegistry,
        cancel: &'a CancellationToken,
        dry_run: bool,
        limit: u32,
    ) -> Self {
        Self {
            registry,
            cancel,
            dry_run,
            limit,
            identity: IdentityMaps::new(),
        }
    }

    pub fn identity(&self) -> &IdentityMaps {
        &self.identity
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug)]
pub struct TableOutcome {
    pub report: TableReport,
    /// Stopped between rows because cancellation was requested.
    pub cancelled: bool,
}

/// Processes one chunk of `table` starting after `cursor`.
///
/// Only a failed chunk fetch or an unregistered table is fatal; everything
/// that goes wrong with an individual row lands in the report.
pub async fn migrate_table(
    run: &mut RunContext<'_>,
    table: TableName,
    cursor: Option<LegacyKey>,
) -> Result<TableOutcome, MigrationError> {
    let registry = run.registry;
    let legacy = registry.legacy(table)?;
    let target = registry.target(table)?;

    let query = ChunkQuery::new(run.limit, cursor.clone());
    let fetched = legacy.find_chunk(&query).await?;
    let fetched_len = fetched.len();
    let last_fetched = fetched
        .last()
        .and_then(|row| row.get("id"))
        .and_then(LegacyKey::from_value);
    let live: Vec<LegacyRow> = fetched
        .into_iter()
        .map(LegacyRow::new)
        .filter(|row| !row.is_soft_deleted())
        .collect();

    let mut report = TableReport::new(table, cursor);
    if live.is_empty() {
        // A page made only of soft-deleted rows must not pin the cursor.
        if fetched_len > 0 {
            report.next_cursor = last_fetched.or(report.next_cursor);
            report.has_more = query.has_more(fetched_len);
        }
        tracing::debug!(
            target: "cutover",
            event = "migration_chunk_empty",
            table = table.as_str(),
            fetched = fetched_len
        );
        return Ok(TableOutcome {
            report,
            cancelled: false,
        });
    }
    report.read = live.len() as u64;
    report.has_more = query.has_more(fetched_len);

    let mut worker = TableRun {
        run,
        table,
        target,
        report,
    };
    let mut cancelled = false;
    for row in &live {
        if worker.run.is_cancelled() {
            cancelled = true;
            worker.report.has_more = true;
            break;
        }
        match table.kind() {
            TableKind::Geography => worker.copy_row(row).await,
            _ => worker.remap_row(row).await,
        }
        if let Some(pk) = row.primary_key() {
            worker.report.next_cursor = Some(pk);
        }
    }

    Ok(TableOutcome {
        report: worker.report,
        cancelled,
    })
}

/// A row ready to write, plus what identity bookkeeping it needs afterwards.
struct Prepared {
    record: Record,
    entity: Option<MappedEntity>,
    aliases: Vec<LegacyKey>,
    email: Option<String>,
}

impl Prepared {
    fn plain(record: Record) -> Self {
        Self {
            record,
            entity: None,
            aliases: Vec::new(),
            email: None,
        }
    }

    fn mapped(record: Record, entity: MappedEntity, legacy_id: &LegacyKey, mut aliases: Vec<LegacyKey>) -> Self {
        if !aliases.contains(legacy_id) {
            aliases.push(legacy_id.clone());
        }
        Self {
            record,
            entity: Some(entity),
            aliases,
            email: None,
        }
    }

    fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }
}

enum WriteOutcome {
    Created,
    Reconciled,
    Failed,
}

struct TableRun<'r, 'a> {
    run: &'r mut RunContext<'a>,
    table: TableName,
    target: &'a dyn TargetRepo,
    report: TableReport,
}

impl<'r, 'a> TableRun<'r, 'a> {
    async fn remap_row(&mut self, row: &LegacyRow) {
        let Some(legacy_id) = row.first_key(id_chain(self.table)) else {
            self.row_error(None, REASON_MISSING_ID.to_string());
            return;
        };
        let target_id = derive_id(self.table, &legacy_id);

        let prepared = match self.prepare(row, &legacy_id, &target_id).await {
            Ok(prepared) => prepared,
            Err(reason) => {
                self.row_error(Some(legacy_id), reason);
                return;
            }
        };

        if !self.run.dry_run {
            if let Some(email) = prepared.email.as_deref() {
                match self.target.find_unique("email", &json!(email)).await {
                    Ok(Some(existing)) => {
                        let existing_id = existing
                            .get("id")
                            .and_then(LegacyKey::from_value)
                            .map(|k| k.to_string())
                            .unwrap_or_else(|| target_id.clone());
                        self.remember(&prepared, &existing_id);
                        self.conflict(REASON_EMAIL, Some(legacy_id), json!({ "email": email }));
                        return;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        self.row_error(Some(legacy_id), err.to_string());
                        return;
                    }
                }
            }
        }

        if self.run.dry_run {
            self.report.planned += 1;
            self.remember(&prepared, &target_id);
            return;
        }

        let id = Value::String(target_id.clone());
        match self.write(&id, &prepared.record, &legacy_id).await {
            WriteOutcome::Created | WriteOutcome::Reconciled => {
                self.remember(&prepared, &target_id)
            }
            WriteOutcome::Failed => {}
        }
    }

    /// Geography rows keep their legacy key as the target key.
    async fn copy_row(&mut self, row: &LegacyRow) {
        let Some(id) = row.primary_key() else {
            self.row_error(None, REASON_MISSING_ID.to_string());
            return;
        };
        let parsed: GeographyRow = match row.parse() {
            Ok(parsed) => parsed,
            Err(err) => {
                self.row_error(Some(id), invalid_row(err));
                return;
            }
        };
        let record = match rows::into_record(&GeographyRecord::from_row(self.table, &id, parsed)) {
            Ok(record) => record,
            Err(err) => {
                self.row_error(Some(id), invalid_row(err));
                return;
            }
        };
        if self.run.dry_run {
            self.report.planned += 1;
            return;
        }
        self.write(&id.to_value(), &record, &id).await;
    }

    async fn prepare(
        &mut self,
        row: &LegacyRow,
        legacy_id: &LegacyKey,
        target_id: &str,
    ) -> Result<Prepared, String> {
        let id = target_id.to_string();
        match self.table {
            TableName::Industries => {
                let parsed: IndustryRow = row.parse().map_err(invalid_row)?;
                let record = rows::into_record(&IndustryRecord::from_row(id, parsed))
                    .map_err(invalid_row)?;
                Ok(Prepared::mapped(
                    record,
                    MappedEntity::Industries,
                    legacy_id,
                    row.keys(rows::INDUSTRY_ALIASES),
                ))
            }
            TableName::Occupations => {
                let parsed: OccupationRow = row.parse().map_err(invalid_row)?;
                let industry = self
                    .link(
                        row,
                        legacy_id,
                        LinkField::Industry,
                        MappedEntity::Industries,
                        rows::OCCUPATION_INDUSTRY_FK,
                        false,
                    )
                    .await;
                let record = rows::into_record(&OccupationRecord::from_row(id, parsed, industry))
                    .map_err(invalid_row)?;
                Ok(Prepared::mapped(
                    record,
                    MappedEntity::Occupations,
                    legacy_id,
                    row.keys(rows::OCCUPATION_ALIASES),
                ))
            }
            TableName::Admins => {
                let parsed: AdminRow = row.parse().map_err(invalid_row)?;
                let mapped = AdminRecord::from_row(id, parsed);
                let email = mapped.email.clone();
                let record = rows::into_record(&mapped).map_err(invalid_row)?;
                Ok(Prepared::mapped(
                    record,
                    MappedEntity::Admins,
                    legacy_id,
                    row.keys(rows::ADMIN_ALIASES),
                )
                .with_email(email))
            }
            TableName::Candidates => {
                let parsed: CandidateRow = row.parse().map_err(invalid_row)?;
                let mapped = CandidateRecord::from_row(id, parsed);
                let email = mapped.email.clone();
                let record = rows::into_record(&mapped).map_err(invalid_row)?;
                Ok(Prepared::mapped(
                    record,
                    MappedEntity::Candidates,
                    legacy_id,
                    row.keys(rows::CANDIDATE_ALIASES),
                )
                .with_email(email))
            }
            TableName::CandidateWorkExps => {
                let parsed: WorkExpRow = row.parse().map_err(invalid_row)?;
                let links = self.detail_links(row, legacy_id).await;
                let record = rows::into_record(&WorkExpRecord::from_row(id, parsed, links))
                    .map_err(invalid_row)?;
                Ok(Prepared::plain(record))
            }
            TableName::CandidateSkills => {
                let parsed: SkillRow = row.parse().map_err(invalid_row)?;
                let links = self.detail_links(row, legacy_id).await;
                let record = rows::into_record(&SkillRecord::from_row(id, parsed, links))
                    .map_err(invalid_row)?;
                Ok(Prepared::plain(record))
            }
            other => Err(format!("{other} rows are copied by key, not remapped")),
        }
    }

    /// Candidate links are always expected; industry and occupation only when present.
    /// An unresolved occupation is dropped rather than written through.
    async fn detail_links(&mut self, row: &LegacyRow, legacy_id: &LegacyKey) -> DetailLinks {
        let candidate = self
            .link(
                row,
                legacy_id,
                LinkField::Candidate,
                MappedEntity::Candidates,
                rows::DETAIL_CANDIDATE_FK,
                true,
            )
            .await;
        let industry = self
            .link(
                row,
                legacy_id,
                LinkField::Industry,
                MappedEntity::Industries,
                rows::DETAIL_INDUSTRY_FK,
                false,
            )
            .await;
        let occupation = self
            .link(
                row,
                legacy_id,
                LinkField::Occupation,
                MappedEntity::Occupations,
                rows::DETAIL_OCCUPATION_FK,
                false,
            )
            .await;
        DetailLinks {
            candidate,
            industry,
            occupation,
        }
    }

    /// Resolves the first non-null column of `chain` to a target id, recording a
    /// missing link when it cannot be resolved.
    async fn link(
        &mut self,
        row: &LegacyRow,
        row_id: &LegacyKey,
        field: LinkField,
        entity: MappedEntity,
        chain: &[&str],
        required: bool,
    ) -> Option<String> {
        let raw = row.first_value(chain);
        if raw.is_null() && !required {
            return None;
        }
        if let Some(key) = LegacyKey::from_value(&raw) {
            if let Some(id) = self.resolve(entity, &key).await {
                return Some(id);
            }
        }
        self.missing_link(row_id, field, raw);
        None
    }

    /// Identity map first, then the target store for rows an earlier chunk wrote.
    async fn resolve(&mut self, entity: MappedEntity, key: &LegacyKey) -> Option<String> {
        if let Some(id) = self.run.identity.get(entity, key) {
            return Some(id.to_string());
        }
        let derived = json!(derive_id(entity.table(), key));
        if let Some(id) = self.target_id(entity, "id", &derived).await {
            self.run.identity.set(entity, key, &id);
            return Some(id);
        }
        self.resolve_through_legacy(entity, key).await
    }

    /// For keys that are not the referenced row's primary key (a uuid, an
    /// external id): find the legacy row carrying `key` in any alias column and
    /// map it the way its own migration did, by derived id or by email.
    async fn resolve_through_legacy(
        &mut self,
        entity: MappedEntity,
        key: &LegacyKey,
    ) -> Option<String> {
        let registry = self.run.registry;
        let legacy = registry.legacy(entity.table()).ok()?;
        let aliases = alias_columns(entity);
        let found = match legacy.find_by_any(aliases, &key.to_value()).await {
            Ok(found) => LegacyRow::new(found?),
            Err(err) => {
                self.hydrate_failed(entity, key, &err);
                return None;
            }
        };
        if found.is_soft_deleted() {
            return None;
        }
        let legacy_id = found.first_key(id_chain(entity.table()))?;
        let derived = json!(derive_id(entity.table(), &legacy_id));
        let mut id = self.target_id(entity, "id", &derived).await;
        if id.is_none() && matches!(entity, MappedEntity::Admins | MappedEntity::Candidates) {
            let email = found
                .raw()
                .get("email")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|e| !e.is_empty());
            if let Some(email) = email {
                id = self.target_id(entity, "email", &json!(email)).await;
            }
        }
        let id = id?;

        let mut keys = found.keys(aliases);
        if !keys.contains(key) {
            keys.push(key.clone());
        }
        self.run.identity.set_all(entity, &keys, &id);
        tracing::debug!(
            target: "cutover",
            event = "migration_link_hydrated",
            table = self.table.as_str(),
            entity = entity.table().as_str(),
            key = %key,
            legacy_id = %legacy_id
        );
        Some(id)
    }

    /// `id` of the target record whose `column` equals `value`.
    async fn target_id(&self, entity: MappedEntity, column: &str, value: &Value) -> Option<String> {
        let repo = self.run.registry.target(entity.table()).ok()?;
        match repo.find_unique(column, value).await {
            Ok(found) => found
                .and_then(|record| record.get("id").and_then(LegacyKey::from_value))
                .map(|id| id.to_string()),
            Err(err) => {
                self.hydrate_failed(entity, value, &err);
                None
            }
        }
    }

    fn hydrate_failed(&self, entity: MappedEntity, key: &dyn fmt::Display, err: &dyn fmt::Display) {
        tracing::warn!(
            target: "cutover",
            event = "migration_hydrate_failed",
            table = self.table.as_str(),
            entity = entity.table().as_str(),
            key = %key,
            error = %err
        );
    }

    /// create, and on a unique violation fall back to update by `id`.
    async fn write(&mut self, id: &Value, record: &Record, legacy_id: &LegacyKey) -> WriteOutcome {
        match self.target.create(record).await {
            Ok(()) => {
                self.report.written += 1;
                WriteOutcome::Created
            }
            Err(err) if err.is_unique_violation() => match self.target.update(id, record).await {
                Ok(()) => {
                    self.conflict(REASON_UPDATED, Some(legacy_id.clone()), json!({ "id": id }));
                    WriteOutcome::Reconciled
                }
                Err(err) => {
                    self.row_error(Some(legacy_id.clone()), err.to_string());
                    WriteOutcome::Failed
                }
            },
            Err(err) => {
                self.row_error(Some(legacy_id.clone()), err.to_string());
                WriteOutcome::Failed
            }
        }
    }

    fn remember(&mut self, prepared: &Prepared, target_id: &str) {
        if let Some(entity) = prepared.entity {
            self.run.identity.set_all(entity, &prepared.aliases, target_id);
        }
    }

    fn conflict(&mut self, reason: &str, legacy_id: Option<LegacyKey>, key: Value) {
        tracing::debug!(
            target: "cutover",
            event = "migration_conflict",
            table = self.table.as_str(),
            reason,
            key = %key
        );
        self.report.conflicts.push(ConflictEntry {
            table: self.table,
            reason: reason.to_string(),
            legacy_id,
            key,
        });
    }

    fn missing_link(&mut self, row_id: &LegacyKey, field: LinkField, value: Value) {
        tracing::debug!(
            target: "cutover",
            event = "migration_missing_link",
            table = self.table.as_str(),
            row_id = %row_id,
            field = ?field,
            value = %value
        );
        self.report.missing_links.push(MissingLinkEntry {
            table: self.table,
            row_id: Some(row_id.clone()),
            field,
            value,
        });
    }

    fn row_error(&mut self, legacy_id: Option<LegacyKey>, reason: String) {
        tracing::warn!(
            target: "cutover",
            event = "migration_row_error",
            table = self.table.as_str(),
            legacy_id = ?legacy_id,
            reason = %reason
        );
        self.report.errors.push(RowError { legacy_id, reason });
    }
}

fn id_chain(table: TableName) -> &'static [&'static str] {
    match table {
        TableName::Industries => rows::INDUSTRY_ID_CHAIN,
        TableName::Occupations => rows::OCCUPATION_ID_CHAIN,
        TableName::Admins => rows::ADMIN_ID_CHAIN,
        TableName::Candidates => rows::CANDIDATE_ID_CHAIN,
        _ => rows::DETAIL_ID_CHAIN,
    }
}

/// Columns a link value may refer to on the referenced legacy table.
fn alias_columns(entity: MappedEntity) -> &'static [&'static str] {
    match entity {
        MappedEntity::Industries => rows::INDUSTRY_ALIASES,
        MappedEntity::Occupations => rows::OCCUPATION_ALIASES,
        MappedEntity::Admins => rows::ADMIN_ALIASES,
        MappedEntity::Candidates => rows::CANDIDATE_ALIASES,
    }
}

fn invalid_row(err: serde_json::Error) -> String {
    format!("invalid row: {err}")
}
