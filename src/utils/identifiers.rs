// casesync/src/utils/identifiers.rs
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::errors::{Result, SyncError};
use crate::utils::entities::{STAGING_SUFFIX, SYNC_ENTITIES};

/// PostgreSQL truncates identifiers longer than NAMEDATALEN - 1 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

/// A table identifier that passed the allow-list and is safe to splice into SQL text.
///
/// Values never travel through identifiers; they are always bound as parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Validates an arbitrary identifier against the character allow-list.
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(SyncError::InvalidIdentifier {
                name: name.to_string(),
                reason: "identifier cannot be empty".to_string(),
            });
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(SyncError::InvalidIdentifier {
                name: name.to_string(),
                reason: format!("identifier too long: {} chars (max {})", name.len(), MAX_IDENTIFIER_LEN),
            });
        }
        if !identifier_regex().is_match(name) {
            return Err(SyncError::InvalidIdentifier {
                name: name.to_string(),
                reason: "must start with a letter or underscore and contain only letters, digits and underscores".to_string(),
            });
        }
        Ok(TableName(name.to_string()))
    }

    /// Validates a configured entity name: it must be a known syncable entity
    /// as well as a well-formed identifier.
    pub fn entity(name: &str) -> Result<Self> {
        let table = Self::parse(name)?;
        if !SYNC_ENTITIES.contains(&table.as_str()) {
            return Err(SyncError::UnknownEntity(name.to_string()));
        }
        Ok(table)
    }

    /// The holding area paired with this table, e.g. `Cases` -> `Cases_staging`.
    pub fn staging(&self) -> Result<Self> {
        Self::parse(&format!("{}{}", self.0, STAGING_SUFFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for SQL text. The allow-list rules out embedded quotes.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
