//! Shared identifier types.
//!
//! Every identifier wraps a UUID. Identifiers of remotely-owned entities
//! (sensors, owners, properties, plots) are never generated locally in
//! production code; `new()` exists for tests and for locally-owned aggregates.

mod types;

pub use types::{AggregateId, CorrelationId, EventId, OwnerId, PlotId, PropertyId, SensorId};
