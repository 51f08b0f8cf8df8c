use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::identity::LegacyKey;
use super::table::{TableName, CANONICAL_ORDER};
use super::MigrationError;

pub const DEFAULT_LIMIT: u32 = 1000;
pub const MAX_LIMIT: u32 = 10_000;

fn default_dry_run() -> bool {
    true
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Caller-facing run request. Table keys may be canonical names or aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MigrationRequest {
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub cursors: BTreeMap<String, Option<LegacyKey>>,
}

impl Default for MigrationRequest {
    fn default() -> Self {
        Self {
            tables: None,
            dry_run: true,
            limit: DEFAULT_LIMIT,
            cursors: BTreeMap::new(),
        }
    }
}

/// A request with every key resolved and every bound checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub tables: BTreeSet<TableName>,
    pub dry_run: bool,
    pub limit: u32,
    pub cursors: BTreeMap<TableName, Option<LegacyKey>>,
}

impl ResolvedRequest {
    pub fn cursor(&self, table: TableName) -> Option<LegacyKey> {
        self.cursors.get(&table).cloned().flatten()
    }
}

impl MigrationRequest {
    pub fn from_json(raw: &str) -> Result<Self, MigrationError> {
        serde_json::from_str(raw).map_err(|e| MigrationError::invalid("body", e.to_string()))
    }

    pub fn for_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: Some(tables.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Merges `cursors` over the ones already set; tables not named keep theirs.
    pub fn with_cursors(mut self, cursors: &BTreeMap<TableName, Option<LegacyKey>>) -> Self {
        for (table, cursor) in cursors {
            self.cursors.insert(table.as_str().to_string(), cursor.clone());
        }
        self
    }

    /// Validates bounds and resolves table keys. An empty or absent table list means all tables.
    pub fn resolve(&self) -> Result<ResolvedRequest, MigrationError> {
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(MigrationError::invalid(
                "limit",
                format!("must be between 1 and {MAX_LIMIT}, got {}", self.limit),
            ));
        }
        let tables = match &self.tables {
            Some(keys) if !keys.is_empty() => keys
                .iter()
                .map(|k| TableName::parse(k))
                .collect::<Result<BTreeSet<_>, _>>()?,
            _ => CANONICAL_ORDER.iter().copied().collect(),
        };
        let mut cursors = BTreeMap::new();
        for (key, cursor) in &self.cursors {
            cursors.insert(TableName::parse(key)?, cursor.clone());
        }
        Ok(ResolvedRequest {
            tables,
            dry_run: self.dry_run,
            limit: self.limit,
            cursors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_dry_run_over_everything() {
        let req = MigrationRequest::from_json("{}").unwrap();
        assert!(req.dry_run);
        assert_eq!(req.limit, 1000);
        let resolved = req.resolve().unwrap();
        assert_eq!(resolved.tables.len(), CANONICAL_ORDER.len());
        assert!(resolved.cursors.is_empty());
    }

    #[test]
    fn aliases_and_cursors_resolve_to_canonical_tables() {
        let req = MigrationRequest::from_json(
            r#"{"tables": ["job_industries"], "dryRun": false, "limit": 10,
                "cursors": {"industries": 40, "candidates": "c-9", "admins": null}}"#,
        )
        .unwrap();
        let resolved = req.resolve().unwrap();
        assert!(!resolved.dry_run);
        assert_eq!(resolved.tables.iter().copied().collect::<Vec<_>>(), vec![TableName::Industries]);
        assert_eq!(resolved.cursor(TableName::Industries), Some(LegacyKey::Int(40)));
        assert_eq!(
            resolved.cursor(TableName::Candidates),
            Some(LegacyKey::Text("c-9".into()))
        );
        assert_eq!(resolved.cursor(TableName::Admins), None);
    }

    #[test]
    fn limit_out_of_range_is_rejected() {
        for limit in [0, MAX_LIMIT + 1] {
            let err = MigrationRequest::default().with_limit(limit).resolve().unwrap_err();
            assert!(
                matches!(err, MigrationError::InvalidRequest { ref field, .. } if field == "limit"),
                "{err:?}"
            );
        }
    }

    #[test]
    fn unknown_table_is_fatal() {
        let err = MigrationRequest::for_tables(["webinars"]).resolve().unwrap_err();
        assert!(matches!(err, MigrationError::UnknownTable { .. }));
    }

    #[test]
    fn fed_back_cursors_merge_over_earlier_ones() {
        let first: BTreeMap<TableName, Option<LegacyKey>> =
            [(TableName::Industries, Some(LegacyKey::Int(3)))].into_iter().collect();
        let second: BTreeMap<TableName, Option<LegacyKey>> =
            [(TableName::Candidates, Some(LegacyKey::Int(101)))].into_iter().collect();
        let resolved = MigrationRequest::default()
            .with_cursors(&first)
            .with_cursors(&second)
            .resolve()
            .unwrap();
        assert_eq!(resolved.cursor(TableName::Industries), Some(LegacyKey::Int(3)));
        assert_eq!(resolved.cursor(TableName::Candidates), Some(LegacyKey::Int(101)));
    }

    #[test]
    fn malformed_body_is_invalid_request() {
        let err = MigrationRequest::from_json(r#"{"limit": "many"}"#).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidRequest { .. }));
    }
}
