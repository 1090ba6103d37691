//! Integration event contracts.
//!
//! Integration events are the public, versioned wire messages exchanged with
//! the identity and farm services. They are distinct from domain events, which
//! stay internal to the aggregates that raise them.

pub mod envelope;
pub mod error;
pub mod events;

pub use common::EventId;
pub use envelope::{EventEnvelope, EventEnvelopeBuilder};
pub use error::ContractError;
pub use events::{
    AlertAcknowledged, AlertRaised, AlertResolved, IntegrationEvent, IntegrationMessage,
    SensorDeactivated, SensorIngested, SensorOperationalStatusChanged, SensorRegistered,
    UserCreated, UserDeactivated, UserUpdated,
};
