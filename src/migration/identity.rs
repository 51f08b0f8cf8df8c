use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::table::TableName;

/// Opaque legacy primary key. Used for cursoring and id derivation only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyKey {
    Int(i64),
    Text(String),
}

impl LegacyKey {
    /// Reads a key out of a raw column value. Null, empty and non-scalar values yield `None`.
    pub fn from_value(value: &Value) -> Option<LegacyKey> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(LegacyKey::Int)
                .or_else(|| Some(LegacyKey::Text(n.to_string()))),
            Value::String(s) if !s.trim().is_empty() => Some(LegacyKey::Text(s.trim().to_string())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            LegacyKey::Int(v) => Value::from(*v),
            LegacyKey::Text(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for LegacyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyKey::Int(v) => write!(f, "{v}"),
            LegacyKey::Text(s) => f.write_str(s),
        }
    }
}

impl PartialOrd for LegacyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Mirrors SQLite's ordering: integers sort before text.
impl Ord for LegacyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (LegacyKey::Int(a), LegacyKey::Int(b)) => a.cmp(b),
            (LegacyKey::Int(_), LegacyKey::Text(_)) => Ordering::Less,
            (LegacyKey::Text(_), LegacyKey::Int(_)) => Ordering::Greater,
            (LegacyKey::Text(a), LegacyKey::Text(b)) => a.cmp(b),
        }
    }
}

impl From<i64> for LegacyKey {
    fn from(value: i64) -> Self {
        LegacyKey::Int(value)
    }
}

impl From<&str> for LegacyKey {
    fn from(value: &str) -> Self {
        LegacyKey::Text(value.to_string())
    }
}

/// Namespace the previous system minted target ids under (RFC 4122 DNS).
pub const ID_NAMESPACE: Uuid = Uuid::NAMESPACE_DNS;

/// Stable target identifier for `(table, legacy_id)`.
///
/// UUIDv5 over `"{table}:{legacy_id}"`. Pure and total: hashing cannot fail,
/// so there is no random fallback and retries always land on the same row.
pub fn derive_id(table: TableName, legacy_id: &LegacyKey) -> String {
    let name = format!("{}:{}", table.as_str(), legacy_id);
    Uuid::new_v5(&ID_NAMESPACE, name.as_bytes()).to_string()
}

/// Entity types other tables link to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappedEntity {
    Admins,
    Candidates,
    Industries,
    Occupations,
}

impl MappedEntity {
    pub fn table(self) -> TableName {
        match self {
            MappedEntity::Admins => TableName::Admins,
            MappedEntity::Candidates => TableName::Candidates,
            MappedEntity::Industries => TableName::Industries,
            MappedEntity::Occupations => TableName::Occupations,
        }
    }

    pub fn for_table(table: TableName) -> Option<MappedEntity> {
        match table {
            TableName::Admins => Some(MappedEntity::Admins),
            TableName::Candidates => Some(MappedEntity::Candidates),
            TableName::Industries => Some(MappedEntity::Industries),
            TableName::Occupations => Some(MappedEntity::Occupations),
            _ => None,
        }
    }
}

/// Per-run mappings from every known legacy key variant to a target id.
///
/// Owned by a single run; never shared across runs.
#[derive(Debug, Default)]
pub struct IdentityMaps {
    maps: HashMap<MappedEntity, HashMap<String, String>>,
}

impl IdentityMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, entity: MappedEntity, key: &LegacyKey, target_id: &str) {
        self.maps
            .entry(entity)
            .or_default()
            .insert(key.to_string(), target_id.to_string());
    }

    /// Records the same target id under every alias of one legacy row.
    pub fn set_all(&mut self, entity: MappedEntity, keys: &[LegacyKey], target_id: &str) {
        for key in keys {
            self.set(entity, key, target_id);
        }
    }

    pub fn get(&self, entity: MappedEntity, key: &LegacyKey) -> Option<&str> {
        self.maps
            .get(&entity)
            .and_then(|map| map.get(&key.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self, entity: MappedEntity) -> usize {
        self.maps.get(&entity).map_or(0, HashMap::len)
    }

    pub fn clear(&mut self) {
        self.maps.clear();
    }
}
