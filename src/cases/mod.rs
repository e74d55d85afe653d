// casesync/src/cases/mod.rs
//! Row shape moved from the case tracking database into the warehouse.

use serde::{Serialize, Serializer};
use sqlx::FromRow;
use std::collections::HashSet;

use crate::errors::{Result, SyncError};

/// Target columns in insert order. `NationalId` is the reconciliation key.
pub const CASE_COLUMNS: &[&str] = &[
    "Name",
    "PhoneNumber1",
    "NationalId",
    "City",
    "Gender",
    "FamilyNumber",
    "Age",
];

pub const KEY_COLUMN: &str = "NationalId";

/// Gender as coded in the source system. The mapping is fixed in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            10 => Some(Gender::Male),
            20 => Some(Gender::Female),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn code(self) -> i32 {
        match self {
            Gender::Male => 10,
            Gender::Female => 20,
        }
    }

    /// Display label stored in the warehouse.
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "ذكر",
            Gender::Female => "أنثى",
        }
    }

    #[cfg(test)]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "ذكر" => Some(Gender::Male),
            "أنثى" => Some(Gender::Female),
            _ => None,
        }
    }
}

// Previews show the warehouse label, not the variant name.
impl Serialize for Gender {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// A row as projected by the source query, before the gender code is mapped.
#[derive(Debug, Clone, FromRow)]
pub struct SourceCaseRow {
    #[sqlx(rename = "Name")]
    pub name: Option<String>,
    #[sqlx(rename = "PhoneNumber1")]
    pub phone_number1: Option<String>,
    #[sqlx(rename = "NationalId")]
    pub national_id: String,
    #[sqlx(rename = "City")]
    pub city: Option<String>,
    #[sqlx(rename = "Gender")]
    pub gender_code: Option<i32>,
    #[sqlx(rename = "FamilyNumber")]
    pub family_number: Option<String>,
    #[sqlx(rename = "Age")]
    pub age: Option<i32>,
}

/// A case as written to the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseRecord {
    pub name: Option<String>,
    pub phone_number1: Option<String>,
    pub national_id: String,
    pub city: Option<String>,
    pub gender: Option<Gender>,
    pub family_number: Option<String>,
    pub age: Option<i32>,
}

impl CaseRecord {
    pub fn gender_label(&self) -> Option<&'static str> {
        self.gender.map(Gender::label)
    }
}

impl From<SourceCaseRow> for CaseRecord {
    fn from(row: SourceCaseRow) -> Self {
        CaseRecord {
            name: row.name,
            phone_number1: row.phone_number1,
            national_id: row.national_id,
            city: row.city,
            gender: row.gender_code.and_then(Gender::from_code),
            family_number: row.family_number,
            age: row.age,
        }
    }
}

/// Checks the key invariant of a snapshot: every `NationalId` present, non-blank and unique.
pub fn validate_snapshot(records: &[CaseRecord]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if record.national_id.trim().is_empty() {
            return Err(SyncError::InvalidRecord {
                index,
                reason: format!("{} is empty", KEY_COLUMN),
            });
        }
        if !seen.insert(record.national_id.as_str()) {
            return Err(SyncError::DuplicateKey(record.national_id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn sample_case(national_id: &str, name: &str) -> CaseRecord {
    CaseRecord {
        name: Some(name.to_string()),
        phone_number1: Some("0100000000".to_string()),
        national_id: national_id.to_string(),
        city: Some("Cairo".to_string()),
        gender: Some(Gender::Female),
        family_number: Some("7".to_string()),
        age: Some(30),
    }
}
