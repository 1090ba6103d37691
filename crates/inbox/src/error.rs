//! Inbox error types.

use common::CorrelationId;
use contracts::EventId;
use store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// An infrastructure failure while handling an inbound event.
///
/// Returned to the broker so the delivery is retried. Validation problems,
/// duplicates and missing targets are outcomes, never errors.
#[derive(Debug, Error)]
#[error(
    "Failed to handle {event_type} {event_id} for {target_id} (correlation {correlation_id}): {source}"
)]
pub struct InboxError {
    pub event_type: String,
    pub event_id: EventId,
    pub correlation_id: CorrelationId,
    pub target_id: Uuid,
    #[source]
    pub source: StoreError,
}

impl InboxError {
    /// Returns true if a redelivery may succeed.
    pub fn is_transient(&self) -> bool {
        self.source.is_transient()
    }
}

/// Result type for inbox operations.
pub type Result<T> = std::result::Result<T, InboxError>;
