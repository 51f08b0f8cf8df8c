use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identity::LegacyKey;
use super::table::TableName;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub table: TableName,
    pub reason: String,
    pub legacy_id: Option<LegacyKey>,
    /// The unique key that collided, e.g. `{"id": ...}` or `{"email": ...}`.
    pub key: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkField {
    Industry,
    Occupation,
    Admin,
    Candidate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingLinkEntry {
    pub table: TableName,
    pub row_id: Option<LegacyKey>,
    pub field: LinkField,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub legacy_id: Option<LegacyKey>,
    pub reason: String,
}

/// Outcome of one chunk over one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReport {
    pub table: TableName,
    pub read: u64,
    pub written: u64,
    pub planned: u64,
    pub conflicts: Vec<ConflictEntry>,
    pub missing_links: Vec<MissingLinkEntry>,
    pub errors: Vec<RowError>,
    pub next_cursor: Option<LegacyKey>,
    pub has_more: bool,
}

impl TableReport {
    pub fn new(table: TableName, cursor: Option<LegacyKey>) -> Self {
        Self {
            table,
            read: 0,
            written: 0,
            planned: 0,
            conflicts: Vec::new(),
            missing_links: Vec::new(),
            errors: Vec::new(),
            next_cursor: cursor,
            has_more: false,
        }
    }

    /// No rows left behind this chunk's cursor. An empty page is always short,
    /// except one made entirely of soft-deleted rows, which moves the cursor on.
    pub fn is_drained(&self) -> bool {
        !self.has_more
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_read: u64,
    pub total_written: u64,
    pub total_planned: u64,
    pub total_conflicts: u64,
    pub total_missing_links: u64,
    pub total_errors: u64,
}

impl ReportSummary {
    pub fn from_tables(tables: &[TableReport]) -> Self {
        tables.iter().fold(Self::default(), |mut acc, t| {
            acc.total_read += t.read;
            acc.total_written += t.written;
            acc.total_planned += t.planned;
            acc.total_conflicts += t.conflicts.len() as u64;
            acc.total_missing_links += t.missing_links.len() as u64;
            acc.total_errors += t.errors.len() as u64;
            acc
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub tables: Vec<TableReport>,
    /// Resume points to feed into the next request.
    pub cursors: BTreeMap<TableName, Option<LegacyKey>>,
    pub summary: ReportSummary,
    #[serde(default)]
    pub cancelled: bool,
}

impl MigrationReport {
    pub fn assemble(
        dry_run: bool,
        started_at: DateTime<Utc>,
        tables: Vec<TableReport>,
        cancelled: bool,
    ) -> Self {
        let ended_at = Utc::now();
        let cursors = tables
            .iter()
            .map(|t| (t.table, t.next_cursor.clone()))
            .collect();
        let summary = ReportSummary::from_tables(&tables);
        Self {
            dry_run,
            started_at,
            ended_at,
            duration_ms: (ended_at - started_at).num_milliseconds(),
            tables,
            cursors,
            summary,
            cancelled,
        }
    }

    pub fn table(&self, table: TableName) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == table)
    }

    pub fn is_drained(&self) -> bool {
        self.tables.iter().all(TableReport::is_drained)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportFile<'a> {
    generated_at: String,
    report: &'a MigrationReport,
}

/// Writes `report` as pretty JSON under `reports_dir` and returns the file path.
pub fn write_run_report(reports_dir: &Path, report: &MigrationReport) -> Result<PathBuf> {
    fs::create_dir_all(reports_dir)
        .with_context(|| format!("create reports directory {}", reports_dir.display()))?;

    let stem = report.started_at.format("migration-%Y%m%d-%H%M%S").to_string();
    let mut path = reports_dir.join(format!("{stem}.json"));
    // Drained runs can start several chunks within one second.
    let mut n = 1;
    while path.exists() {
        path = reports_dir.join(format!("{stem}-{n}.json"));
        n += 1;
    }
    let payload = RunReportFile {
        generated_at: Utc::now().to_rfc3339(),
        report,
    };
    let json = serde_json::to_string_pretty(&payload).context("serialize migration report")?;
    fs::write(&path, json).with_context(|| format!("write migration report {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table_report(table: TableName, read: u64, written: u64) -> TableReport {
        TableReport {
            read,
            written,
            has_more: read > 0,
            next_cursor: Some(LegacyKey::Int(read as i64)),
            ..TableReport::new(table, None)
        }
    }

    #[test]
    fn summary_sums_every_table() {
        let mut a = table_report(TableName::Industries, 3, 2);
        a.conflicts.push(ConflictEntry {
            table: TableName::Industries,
            reason: "Duplicate existed; updated".into(),
            legacy_id: Some(LegacyKey::Int(1)),
            key: json!({"id": "x"}),
        });
        let mut b = table_report(TableName::CandidateSkills, 4, 4);
        b.missing_links.push(MissingLinkEntry {
            table: TableName::CandidateSkills,
            row_id: Some(LegacyKey::Int(9)),
            field: LinkField::Occupation,
            value: json!(77),
        });
        b.errors.push(RowError {
            legacy_id: None,
            reason: "missing legacy id".into(),
        });
        let summary = ReportSummary::from_tables(&[a, b]);
        assert_eq!(summary.total_read, 7);
        assert_eq!(summary.total_written, 6);
        assert_eq!(summary.total_conflicts, 1);
        assert_eq!(summary.total_missing_links, 1);
        assert_eq!(summary.total_errors, 1);
    }

    #[test]
    fn report_serialises_camel_case_with_cursor_map() {
        let started = Utc::now();
        let report = MigrationReport::assemble(
            true,
            started,
            vec![table_report(TableName::SubDistricts, 2, 0)],
            false,
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["dryRun"], json!(true));
        assert_eq!(value["cursors"]["sub_districts"], json!(2));
        assert_eq!(value["tables"][0]["missingLinks"], json!([]));
        assert_eq!(value["tables"][0]["nextCursor"], json!(2));
        assert_eq!(value["summary"]["totalRead"], json!(2));
    }

    #[test]
    fn missing_link_fields_are_lowercase() {
        let entry = MissingLinkEntry {
            table: TableName::CandidateWorkExps,
            row_id: Some(LegacyKey::Text("w1".into())),
            field: LinkField::Candidate,
            value: Value::Null,
        };
        let value = serde_json::to_value(entry).unwrap();
        assert_eq!(value["field"], json!("candidate"));
        assert_eq!(value["rowId"], json!("w1"));
    }

    #[test]
    fn drained_follows_has_more() {
        let mut t = TableReport::new(TableName::Admins, None);
        assert!(t.is_drained());
        t.read = 5;
        t.has_more = true;
        assert!(!t.is_drained());
        t.has_more = false;
        assert!(t.is_drained());
        // page of deleted rows: nothing read, cursor still moving
        t.read = 0;
        t.has_more = true;
        assert!(!t.is_drained());
    }

    #[test]
    fn report_file_lands_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = MigrationReport::assemble(false, Utc::now(), Vec::new(), false);
        let path = write_run_report(&dir.path().join("reports"), &report).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("migration-") && name.ends_with(".json"));
        let body: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(body["report"]["dryRun"], json!(false));

        let second = write_run_report(&dir.path().join("reports"), &report).unwrap();
        assert_ne!(second, path);
        assert!(second.to_string_lossy().ends_with("-1.json"));
    }
}
