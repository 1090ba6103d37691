//! Domain layer for sensor ingest.
//!
//! This crate provides:
//! - `Aggregate`/`DomainEvent` traits and the `Root` wrapper that tracks
//!   uncommitted events
//! - The `SensorReading` and `Alert` aggregates
//! - Read-side snapshots of sensors and owners mirrored from other services
//!
//! Nothing in here touches storage.

pub mod aggregate;
pub mod alert;
pub mod error;
pub mod reading;
pub mod snapshot;
pub mod validation;

pub use aggregate::{Aggregate, DomainEvent, Root, Version};
pub use alert::{
    Alert, AlertError, AlertEvent, AlertKind, AlertRecord, AlertRules, AlertSeverity, AlertStatus,
    NewAlert,
};
pub use error::{DomainError, UnknownVariant};
pub use reading::{NewReading, ReadingEvent, ReadingMetrics, ReadingRecord, SensorReading};
pub use snapshot::{OperationalStatus, OwnerDetails, OwnerSnapshot, SensorDetails, SensorSnapshot};
pub use validation::{ValidationError, ValidationErrors};
