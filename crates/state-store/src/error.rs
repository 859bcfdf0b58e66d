use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the state store.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// A conditional write found the key at a different version than expected.
    #[error("Concurrency conflict for key {key}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        key: String,
        expected: Version,
        actual: Version,
    },

    /// The store could not be reached or refused the operation.
    #[error("State store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateStoreError {
    /// Returns true if the error is a version conflict that a caller may retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StateStoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for state store operations.
pub type Result<T> = std::result::Result<T, StateStoreError>;
