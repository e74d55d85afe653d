use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Invalid SQL identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Entity '{0}' is not in the list of syncable entities")]
    UnknownEntity(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Invalid record at position {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Duplicate NationalId '{0}' in extracted records")]
    DuplicateKey(String),

    #[error("Staging into {table} failed: {reason}")]
    Staging { table: String, reason: String },

    #[error("Reconciliation of {table} failed, transaction rolled back: {reason}")]
    Reconciliation { table: String, reason: String },

    #[error("Commit of {table} failed, outcome unknown: {reason}")]
    Commit { table: String, reason: String },
}

impl SyncError {
    pub fn staging(table: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SyncError::Staging {
            table: table.into(),
            reason: err.to_string(),
        }
    }

    pub fn reconciliation(table: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SyncError::Reconciliation {
            table: table.into(),
            reason: err.to_string(),
        }
    }

    pub fn commit(table: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SyncError::Commit {
            table: table.into(),
            reason: err.to_string(),
        }
    }

    /// Whether the error leaves the target table guaranteed untouched by this run.
    /// A failed COMMIT may or may not have been applied by the server.
    pub fn target_untouched(&self) -> bool {
        !matches!(self, SyncError::Sqlx(_) | SyncError::Commit { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
