use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sqlx::SqlitePool;

use super::repo::{table_exists, LegacyRepo, SqliteLegacyRepo, SqliteTargetRepo, TargetRepo};
use super::table::{TableName, CANONICAL_ORDER};
use super::MigrationError;

/// Physical names accepted for one logical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelNames {
    pub table: TableName,
    pub legacy: &'static [&'static str],
    pub target: &'static [&'static str],
}

#[derive(Clone)]
struct RepoPair {
    legacy: Arc<dyn LegacyRepo>,
    target: Arc<dyn TargetRepo>,
}

/// Legacy and target repositories per logical table, validated when built.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    entries: BTreeMap<TableName, RepoPair>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (table, pair) in &self.entries {
            map.entry(
                &table.as_str(),
                &format_args!("{} -> {}", pair.legacy.name(), pair.target.name()),
            );
        }
        map.finish()
    }
}

impl ModelRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn resolve(key: &str) -> Result<ModelNames, MigrationError> {
        let table = TableName::parse(key)?;
        Ok(ModelNames {
            table,
            legacy: table.legacy_aliases(),
            target: table.target_aliases(),
        })
    }

    /// Probes both stores for every known table.
    pub async fn from_sqlite(
        legacy: &SqlitePool,
        target: &SqlitePool,
    ) -> Result<Self, MigrationError> {
        Self::from_sqlite_tables(legacy, target, &CANONICAL_ORDER).await
    }

    /// Probes both stores for `tables` only. Any absent table fails the build.
    pub async fn from_sqlite_tables(
        legacy: &SqlitePool,
        target: &SqlitePool,
        tables: &[TableName],
    ) -> Result<Self, MigrationError> {
        let mut builder = Self::builder();
        for table in tables {
            let legacy_name = first_present(
                legacy,
                table.legacy_aliases(),
                &format!("legacy.{}", table.as_str()),
            )
            .await?;
            let target_name = first_present(
                target,
                table.target_aliases(),
                &format!("target.{}", table.as_str()),
            )
            .await?;
            tracing::debug!(
                target: "cutover",
                event = "registry_resolved",
                table = table.as_str(),
                legacy = %legacy_name,
                target_table = %target_name
            );
            builder = builder.register(
                *table,
                SqliteLegacyRepo::new(legacy.clone(), legacy_name),
                SqliteTargetRepo::new(target.clone(), target_name),
            );
        }
        Ok(builder.build())
    }

    pub fn legacy(&self, table: TableName) -> Result<&dyn LegacyRepo, MigrationError> {
        self.pair(table, "legacy", table.legacy_aliases())
            .map(|p| p.legacy.as_ref())
    }

    pub fn target(&self, table: TableName) -> Result<&dyn TargetRepo, MigrationError> {
        self.pair(table, "target", table.target_aliases())
            .map(|p| p.target.as_ref())
    }

    pub fn contains(&self, table: TableName) -> bool {
        self.entries.contains_key(&table)
    }

    /// `(table, legacy physical name, target physical name)` in canonical order.
    pub fn describe(&self) -> Vec<(TableName, String, String)> {
        CANONICAL_ORDER
            .iter()
            .filter_map(|t| {
                self.entries.get(t).map(|p| {
                    (*t, p.legacy.name().to_string(), p.target.name().to_string())
                })
            })
            .collect()
    }

    fn pair(
        &self,
        table: TableName,
        side: &str,
        aliases: &[&str],
    ) -> Result<&RepoPair, MigrationError> {
        self.entries
            .get(&table)
            .ok_or_else(|| MigrationError::RepoNotFound {
                label: format!("{side}.{}", table.as_str()),
                tried: aliases.iter().map(|s| s.to_string()).collect(),
            })
    }
}

async fn first_present(
    pool: &SqlitePool,
    candidates: &[&str],
    label: &str,
) -> Result<String, MigrationError> {
    for name in candidates {
        if table_exists(pool, name).await? {
            return Ok((*name).to_string());
        }
    }
    Err(MigrationError::RepoNotFound {
        label: label.to_string(),
        tried: candidates.iter().map(|s| s.to_string()).collect(),
    })
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<TableName, RepoPair>,
}

impl RegistryBuilder {
    pub fn register<L, T>(self, table: TableName, legacy: L, target: T) -> Self
    where
        L: LegacyRepo + 'static,
        T: TargetRepo + 'static,
    {
        self.register_arc(table, Arc::new(legacy), Arc::new(target))
    }

    pub fn register_arc(
        mut self,
        table: TableName,
        legacy: Arc<dyn LegacyRepo>,
        target: Arc<dyn TargetRepo>,
    ) -> Self {
        self.entries.insert(table, RepoPair { legacy, target });
        self
    }

    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            entries: self.entries,
        }
    }
}
