use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::MigrationError;

/// Logical tables the engine knows how to migrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Industries,
    Occupations,
    Prefectures,
    Provinces,
    Cities,
    Districts,
    SubDistricts,
    Admins,
    Candidates,
    CandidateWorkExps,
    CandidateSkills,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Reference,
    Geography,
    Account,
    Detail,
}

/// Processing order. References before geography before accounts before details.
pub const CANONICAL_ORDER: [TableName; 11] = [
    TableName::Industries,
    TableName::Occupations,
    TableName::Prefectures,
    TableName::Provinces,
    TableName::Cities,
    TableName::Districts,
    TableName::SubDistricts,
    TableName::Admins,
    TableName::Candidates,
    TableName::CandidateWorkExps,
    TableName::CandidateSkills,
];

impl TableName {
    pub fn as_str(self) -> &'static str {
        match self {
            TableName::Industries => "industries",
            TableName::Occupations => "occupations",
            TableName::Prefectures => "prefectures",
            TableName::Provinces => "provinces",
            TableName::Cities => "cities",
            TableName::Districts => "districts",
            TableName::SubDistricts => "sub_districts",
            TableName::Admins => "admins",
            TableName::Candidates => "candidates",
            TableName::CandidateWorkExps => "candidate_work_exps",
            TableName::CandidateSkills => "candidate_skills",
        }
    }

    pub fn kind(self) -> TableKind {
        match self {
            TableName::Industries | TableName::Occupations => TableKind::Reference,
            TableName::Prefectures
            | TableName::Provinces
            | TableName::Cities
            | TableName::Districts
            | TableName::SubDistricts => TableKind::Geography,
            TableName::Admins | TableName::Candidates => TableKind::Account,
            TableName::CandidateWorkExps | TableName::CandidateSkills => TableKind::Detail,
        }
    }

    /// Physical table names tried on the legacy store, in preference order.
    pub fn legacy_aliases(self) -> &'static [&'static str] {
        match self {
            TableName::Industries => &["industries", "job_industries"],
            TableName::Occupations => &["occupations", "job_occupations"],
            TableName::Prefectures => &["prefectures"],
            TableName::Provinces => &["provinces"],
            TableName::Cities => &["cities"],
            TableName::Districts => &["districts"],
            TableName::SubDistricts => &["sub_districts"],
            TableName::Admins => &["admins"],
            TableName::Candidates => &["candidates"],
            TableName::CandidateWorkExps => &["candidate_work_exps"],
            TableName::CandidateSkills => &["candidate_skills"],
        }
    }

    /// Physical table names tried on the target store, in preference order.
    pub fn target_aliases(self) -> &'static [&'static str] {
        match self {
            TableName::Industries => &["industries"],
            TableName::Occupations => &["occupations"],
            TableName::Prefectures => &["prefectures"],
            TableName::Provinces => &["provinces"],
            TableName::Cities => &["cities"],
            TableName::Districts => &["districts"],
            TableName::SubDistricts => &["sub_districts"],
            TableName::Admins => &["admins"],
            TableName::Candidates => &["candidates"],
            TableName::CandidateWorkExps => &["candidate_work_exps"],
            TableName::CandidateSkills => &["candidate_skills"],
        }
    }

    /// Tables whose identity maps must be populated before this one runs.
    pub fn dependencies(self) -> &'static [TableName] {
        match self {
            TableName::Occupations => &[TableName::Industries],
            TableName::CandidateWorkExps | TableName::CandidateSkills => &[
                TableName::Candidates,
                TableName::Industries,
                TableName::Occupations,
            ],
            _ => &[],
        }
    }

    /// Resolves a canonical name or any registered alias on either side.
    pub fn parse(key: &str) -> Result<TableName, MigrationError> {
        let needle = key.trim().to_ascii_lowercase();
        CANONICAL_ORDER
            .iter()
            .copied()
            .find(|table| {
                table.as_str() == needle
                    || table.legacy_aliases().contains(&needle.as_str())
                    || table.target_aliases().contains(&needle.as_str())
            })
            .ok_or_else(|| MigrationError::UnknownTable {
                key: key.to_string(),
                known: CANONICAL_ORDER
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub(crate) fn rank(self) -> usize {
        CANONICAL_ORDER
            .iter()
            .position(|t| *t == self)
            .unwrap_or(CANONICAL_ORDER.len())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableName::parse(s)
    }
}
