//! Ingest error types.

use common::{AggregateId, SensorId};
use contracts::ContractError;
use domain::{AlertError, ValidationErrors};
use store::StoreError;
use thiserror::Error;

/// Errors returned by the write-side use cases.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The input failed structural validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// No active snapshot exists for the sensor.
    #[error("Sensor not found: {0}")]
    SensorNotFound(SensorId),

    /// The alert does not exist.
    #[error("Alert not found: {0}")]
    AlertNotFound(AggregateId),

    /// The alert rejected the requested transition.
    #[error(transparent)]
    Alert(#[from] AlertError),

    /// A domain event could not be mapped to its integration contract.
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    /// The store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Returns true for outcomes the caller caused, as opposed to failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            IngestError::Validation(_)
                | IngestError::SensorNotFound(_)
                | IngestError::AlertNotFound(_)
                | IngestError::Alert(_)
        )
    }

    /// Short label for metrics and batch reports.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => "validation",
            IngestError::SensorNotFound(_) => "sensor_not_found",
            IngestError::AlertNotFound(_) => "alert_not_found",
            IngestError::Alert(_) => "invalid_transition",
            IngestError::Contract(_) => "contract",
            IngestError::Store(_) => "store",
        }
    }
}

/// Result type for ingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;
