//! Typed legacy rows and target records.
//!
//! Legacy rows arrive as column maps. Key and foreign-key columns are read
//! straight off the map through explicit fallback chains; payload columns are
//! deserialised into one struct per entity and mapped field by field into the
//! target record. Every text field is trimmed during mapping. Legacy columns
//! not named here ride along unchanged apart from trimming; only the key,
//! alias and foreign-key columns replaced by mapped ids are stripped.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::identity::LegacyKey;
use super::repo::Record;
use super::table::TableName;

pub const SOFT_DELETE_COLUMN: &str = "deleted_at";

pub(crate) const INDUSTRY_ID_CHAIN: &[&str] = &["id", "legacy_id"];
pub(crate) const INDUSTRY_ALIASES: &[&str] = &["id", "legacy_id"];
pub(crate) const OCCUPATION_ID_CHAIN: &[&str] = &["id", "legacy_id"];
pub(crate) const OCCUPATION_ALIASES: &[&str] = &["id", "legacy_id"];
pub(crate) const OCCUPATION_INDUSTRY_FK: &[&str] = &[
    "id_industry",
    "industry_id",
    "industry",
    "id_job_industry",
    "id_job_indsutry",
];
pub(crate) const ADMIN_ID_CHAIN: &[&str] = &["id", "legacy_id", "uuid"];
pub(crate) const ADMIN_ALIASES: &[&str] = &["id", "uuid", "legacy_id"];
pub(crate) const CANDIDATE_ID_CHAIN: &[&str] = &["id", "uuid", "legacy_id", "id_candidate"];
pub(crate) const CANDIDATE_ALIASES: &[&str] =
    &["id", "uuid", "legacy_id", "id_candidate", "external_id"];
pub(crate) const DETAIL_ID_CHAIN: &[&str] = &["id", "legacy_id"];
pub(crate) const DETAIL_CANDIDATE_FK: &[&str] = &["id_candidate", "candidate_id", "candidate"];
pub(crate) const DETAIL_INDUSTRY_FK: &[&str] = &["industry", "id_industry", "industry_id"];
pub(crate) const DETAIL_OCCUPATION_FK: &[&str] = &["occupation", "id_occupation", "occupation_id"];

/// A legacy row as fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRow {
    raw: Record,
}

impl LegacyRow {
    pub fn new(raw: Record) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Record {
        &self.raw
    }

    /// Null, empty string, `0` and `false` all mean "live".
    pub fn is_soft_deleted(&self) -> bool {
        match self.raw.get(SOFT_DELETE_COLUMN) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map_or(true, |v| v != 0.0),
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// The `id` column, which also drives the cursor.
    pub fn primary_key(&self) -> Option<LegacyKey> {
        self.raw.get("id").and_then(LegacyKey::from_value)
    }

    /// First column in `chain` holding a usable key.
    pub fn first_key(&self, chain: &[&str]) -> Option<LegacyKey> {
        chain
            .iter()
            .find_map(|col| self.raw.get(*col).and_then(LegacyKey::from_value))
    }

    /// First non-null raw value in `chain`, for reporting links that fail to parse as keys.
    pub fn first_value(&self, chain: &[&str]) -> Value {
        chain
            .iter()
            .find_map(|col| self.raw.get(*col).filter(|v| !v.is_null()).cloned())
            .unwrap_or(Value::Null)
    }

    /// Every distinct key present in `columns`.
    pub fn keys(&self, columns: &[&str]) -> Vec<LegacyKey> {
        let mut out: Vec<LegacyKey> = Vec::new();
        for key in columns
            .iter()
            .filter_map(|col| self.raw.get(*col).and_then(LegacyKey::from_value))
        {
            if !out.contains(&key) {
                out.push(key);
            }
        }
        out
    }

    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.raw.clone()))
    }
}

/// Accepts text, numbers and booleans for text columns; the legacy schema was loose.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string())
}

/// Trimmed, with blanks treated as absent. Used for natural keys.
fn trimmed_non_empty(value: Option<String>) -> Option<String> {
    trimmed(value).filter(|s| !s.is_empty())
}

/// Legacy columns without a typed field, trimmed, minus the primary key, the
/// soft-delete marker and every column in `consumed`.
fn passthrough(extra: Record, consumed: &[&[&str]]) -> Record {
    extra
        .into_iter()
        .filter(|(column, _)| column != "id" && column != SOFT_DELETE_COLUMN)
        .filter(|(column, _)| !consumed.iter().any(|chain| chain.contains(&column.as_str())))
        .map(|(column, value)| match value {
            Value::String(s) => (column, Value::String(s.trim().to_string())),
            other => (column, other),
        })
        .collect()
}

pub fn into_record<T: Serialize>(value: &T) -> Result<Record, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a record object, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndustryRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

impl IndustryRecord {
    pub fn from_row(id: String, row: IndustryRow) -> Self {
        Self {
            id,
            title: trimmed(row.title),
            created_at: row.created_at,
            updated_at: row.updated_at,
            extra: passthrough(row.extra, &[INDUSTRY_ALIASES]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OccupationRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupationRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

impl OccupationRecord {
    pub fn from_row(id: String, row: OccupationRow, id_industry: Option<String>) -> Self {
        Self {
            id,
            title: trimmed(row.title),
            id_industry,
            created_at: row.created_at,
            updated_at: row.updated_at,
            extra: passthrough(row.extra, &[OCCUPATION_ALIASES, OCCUPATION_INDUSTRY_FK]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeographyRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub province_id: Option<Value>,
    #[serde(default)]
    pub city_id: Option<Value>,
    #[serde(default)]
    pub district_id: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

/// Geography keeps its legacy keys, parents included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographyRecord {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

impl GeographyRecord {
    /// Only the parent column belonging to `table` is carried over.
    pub fn from_row(table: TableName, id: &LegacyKey, row: GeographyRow) -> Self {
        let (province_id, city_id, district_id, postal_code) = match table {
            TableName::Cities => (row.province_id, None, None, None),
            TableName::Districts => (None, row.city_id, None, None),
            TableName::SubDistricts => (None, None, row.district_id, trimmed(row.postal_code)),
            _ => (None, None, None, None),
        };
        Self {
            id: id.to_value(),
            name: trimmed(row.name),
            code: trimmed(row.code),
            postal_code,
            province_id: province_id.filter(|v| !v.is_null()),
            city_id: city_id.filter(|v| !v.is_null()),
            district_id: district_id.filter(|v| !v.is_null()),
            created_at: row.created_at,
            updated_at: row.updated_at,
            extra: passthrough(row.extra, &[]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

impl AdminRecord {
    pub fn from_row(id: String, row: AdminRow) -> Self {
        Self {
            id,
            name: trimmed(row.name),
            email: trimmed_non_empty(row.email),
            password: trimmed(row.password),
            phone: trimmed(row.phone),
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            extra: passthrough(row.extra, &[ADMIN_ID_CHAIN, ADMIN_ALIASES]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sex: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub marital_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub religion: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub talent_id: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub religion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

impl CandidateRecord {
    pub fn from_row(id: String, row: CandidateRow) -> Self {
        Self {
            id,
            name: trimmed(row.name),
            email: trimmed_non_empty(row.email),
            password: trimmed(row.password),
            phone: trimmed(row.phone),
            sex: trimmed(row.sex),
            marital_status: trimmed(row.marital_status),
            religion: trimmed(row.religion),
            talent_id: trimmed(row.talent_id),
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            extra: passthrough(row.extra, &[CANDIDATE_ID_CHAIN, CANDIDATE_ALIASES]),
        }
    }
}

/// Foreign keys already resolved to target ids. `None` means omitted from the write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailLinks {
    pub candidate: Option<String>,
    pub industry: Option<String>,
    pub occupation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkExpRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub company: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub start_year: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub start_month: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end_year: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end_month: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub field: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tag: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkExpRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_candidate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

impl WorkExpRecord {
    pub fn from_row(id: String, row: WorkExpRow, links: DetailLinks) -> Self {
        Self {
            id,
            id_candidate: links.candidate,
            id_industry: links.industry,
            id_occupation: links.occupation,
            company: trimmed(row.company),
            start_year: trimmed(row.start_year),
            start_month: trimmed(row.start_month),
            end_year: trimmed(row.end_year),
            end_month: trimmed(row.end_month),
            description: trimmed(row.description),
            field: trimmed(row.field),
            tag: trimmed(row.tag),
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            extra: passthrough(
                row.extra,
                &[
                    DETAIL_ID_CHAIN,
                    DETAIL_CANDIDATE_FK,
                    DETAIL_INDUSTRY_FK,
                    DETAIL_OCCUPATION_FK,
                ],
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub certificate: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub issue_date: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_candidate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Record,
}

impl SkillRecord {
    pub fn from_row(id: String, row: SkillRow, links: DetailLinks) -> Self {
        Self {
            id,
            id_candidate: links.candidate,
            id_industry: links.industry,
            id_occupation: links.occupation,
            name: trimmed(row.name),
            tag: trimmed(row.tag),
            certificate: trimmed(row.certificate),
            level: trimmed(row.level),
            issue_date: trimmed(row.issue_date),
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            extra: passthrough(
                row.extra,
                &[
                    DETAIL_ID_CHAIN,
                    DETAIL_CANDIDATE_FK,
                    DETAIL_INDUSTRY_FK,
                    DETAIL_OCCUPATION_FK,
                ],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> LegacyRow {
        LegacyRow::new(value.as_object().cloned().unwrap())
    }

    #[test]
    fn soft_delete_marker_is_truthy_only() {
        assert!(!row(json!({"id": 1})).is_soft_deleted());
        assert!(!row(json!({"id": 1, "deleted_at": null})).is_soft_deleted());
        assert!(!row(json!({"id": 1, "deleted_at": ""})).is_soft_deleted());
        assert!(!row(json!({"id": 1, "deleted_at": 0})).is_soft_deleted());
        assert!(row(json!({"id": 1, "deleted_at": "2024-01-01"})).is_soft_deleted());
        assert!(row(json!({"id": 1, "deleted_at": 1704067200})).is_soft_deleted());
    }

    #[test]
    fn fallback_chain_takes_first_usable_key() {
        let r = row(json!({"id": null, "legacy_id": "L-9", "uuid": "u-9"}));
        assert_eq!(r.first_key(ADMIN_ID_CHAIN), Some(LegacyKey::Text("L-9".into())));
        assert_eq!(r.primary_key(), None);
        assert_eq!(
            r.keys(ADMIN_ALIASES),
            vec![LegacyKey::Text("u-9".into()), LegacyKey::Text("L-9".into())]
        );
    }

    #[test]
    fn keys_are_deduplicated() {
        let r = row(json!({"id": 4, "legacy_id": 4, "id_candidate": "4"}));
        assert_eq!(
            r.keys(CANDIDATE_ALIASES),
            vec![LegacyKey::Int(4), LegacyKey::Text("4".into())]
        );
    }

    #[test]
    fn industry_mapping_trims_and_carries_extra_columns() {
        let legacy = row(json!({
            "id": 1, "legacy_id": "IND-1", "title": "Manufacturing ",
            "legacy_flag": true, "slug": " manufacturing ", "deleted_at": null
        }));
        let parsed: IndustryRow = legacy.parse().unwrap();
        let record = into_record(&IndustryRecord::from_row("t-1".into(), parsed)).unwrap();
        assert_eq!(record.get("title"), Some(&json!("Manufacturing")));
        assert_eq!(record.get("id"), Some(&json!("t-1")));
        assert_eq!(record.get("legacy_flag"), Some(&json!(true)));
        assert_eq!(record.get("slug"), Some(&json!("manufacturing")));
        assert!(!record.contains_key("legacy_id"));
        assert!(!record.contains_key("deleted_at"));
        assert!(!record.contains_key("created_at"));
    }

    #[test]
    fn candidate_extras_pass_through_without_alias_columns() {
        let legacy = row(json!({
            "id": 100, "uuid": "c-uuid-100", "external_id": "x-1", "name": "Ani",
            "education": " S1 ", "birth_date": "1990-01-02", "last_login_ip": null
        }));
        let record = into_record(&CandidateRecord::from_row("t-100".into(), legacy.parse().unwrap()))
            .unwrap();
        assert_eq!(record.get("education"), Some(&json!("S1")));
        assert_eq!(record.get("birth_date"), Some(&json!("1990-01-02")));
        assert_eq!(record.get("last_login_ip"), Some(&Value::Null));
        for alias in ["uuid", "external_id"] {
            assert!(!record.contains_key(alias), "{alias} leaked");
        }
        assert_eq!(record.get("id"), Some(&json!("t-100")));
    }

    #[test]
    fn detail_extras_skip_every_link_chain() {
        let legacy = row(json!({
            "id": 5, "candidate_id": "c-uuid-1", "id_industry": 3, "occupation": 9,
            "name": "Forklift", "is_verified": 1
        }));
        let record = into_record(&SkillRecord::from_row(
            "s-5".into(),
            legacy.parse().unwrap(),
            DetailLinks::default(),
        ))
        .unwrap();
        assert_eq!(record.get("is_verified"), Some(&json!(1)));
        for column in ["candidate_id", "id_industry", "occupation", "id_candidate"] {
            assert!(!record.contains_key(column), "{column} leaked");
        }
    }

    #[test]
    fn numeric_text_columns_are_accepted() {
        let legacy = row(json!({"id": 2, "name": " Bo ", "phone": 628123, "email": "  "}));
        let parsed: AdminRow = legacy.parse().unwrap();
        let record = AdminRecord::from_row("t-2".into(), parsed);
        assert_eq!(record.phone.as_deref(), Some("628123"));
        assert_eq!(record.name.as_deref(), Some("Bo"));
        assert_eq!(record.email, None);
    }

    #[test]
    fn geography_keeps_only_its_parent_column() {
        let legacy = row(json!({
            "id": 12, "name": " Bandung ", "province_id": 3, "city_id": 99, "postal_code": "40111"
        }));
        let record = GeographyRecord::from_row(
            TableName::Cities,
            &LegacyKey::Int(12),
            legacy.parse().unwrap(),
        );
        let map = into_record(&record).unwrap();
        assert_eq!(map.get("id"), Some(&json!(12)));
        assert_eq!(map.get("province_id"), Some(&json!(3)));
        assert!(!map.contains_key("city_id"));
        assert!(!map.contains_key("postal_code"));
        assert_eq!(map.get("name"), Some(&json!("Bandung")));
    }

    #[test]
    fn detail_links_omit_unresolved_fields() {
        let record = WorkExpRecord::from_row(
            "w-1".into(),
            WorkExpRow {
                company: Some(" Acme ".into()),
                ..WorkExpRow::default()
            },
            DetailLinks {
                candidate: Some("c-1".into()),
                industry: None,
                occupation: None,
            },
        );
        let map = into_record(&record).unwrap();
        assert_eq!(map.get("id_candidate"), Some(&json!("c-1")));
        assert!(!map.contains_key("id_occupation"));
        assert!(!map.contains_key("id_industry"));
        assert_eq!(map.get("company"), Some(&json!("Acme")));
    }
}
