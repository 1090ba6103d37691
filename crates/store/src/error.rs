use common::AggregateId;
use domain::Version;
use thiserror::Error;

/// Errors that can occur when reading or committing.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An aggregate was saved from a stale copy.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// An aggregate was staged before its creation event was applied.
    #[error("Cannot persist uninitialized {0}")]
    Uninitialized(&'static str),

    /// A stored row could not be mapped back to a domain value.
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    /// The outbox entry does not exist.
    #[error("Outbox entry not found: {0}")]
    OutboxEntryNotFound(uuid::Uuid),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
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

impl StoreError {
    /// Returns true if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Database(_) | StoreError::ConcurrencyConflict { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
