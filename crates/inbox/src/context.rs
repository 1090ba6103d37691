use common::CorrelationId;
use contracts::{EventEnvelope, EventId, IntegrationEvent};
use messaging::Delivery;
use store::StoreError;
use uuid::Uuid;

use crate::InboxError;

/// Metadata of the delivery being handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    pub event_id: EventId,
    pub event_type: String,
    pub correlation_id: CorrelationId,
    pub source: String,
    /// 1 on first delivery.
    pub attempt: u32,
}

impl MessageContext {
    pub fn from_envelope(envelope: &EventEnvelope, attempt: u32) -> Self {
        Self {
            event_id: envelope.event_id,
            event_type: envelope.event_type.clone(),
            correlation_id: envelope.correlation_id,
            source: envelope.source.clone(),
            attempt,
        }
    }

    pub fn from_delivery(delivery: &Delivery) -> Self {
        Self::from_envelope(&delivery.envelope, delivery.attempt)
    }

    /// Context for handling `event` outside the broker, on a fresh causal chain.
    pub fn for_event<E: IntegrationEvent>(event: &E) -> Self {
        Self {
            event_id: event.event_id(),
            event_type: E::EVENT_TYPE.to_string(),
            correlation_id: CorrelationId::new(),
            source: "direct".to_string(),
            attempt: 1,
        }
    }

    /// Wraps a storage failure with this delivery's identity.
    pub fn fail(&self, target_id: impl Into<Uuid>, source: StoreError) -> InboxError {
        InboxError {
            event_type: self.event_type.clone(),
            event_id: self.event_id,
            correlation_id: self.correlation_id,
            target_id: target_id.into(),
            source,
        }
    }
}

/// What a handler did with an event. Every variant acknowledges the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// A new snapshot was stored.
    Created,
    /// An existing snapshot was changed.
    Applied,
    /// The snapshot already reflects the event.
    Duplicate,
    /// The event is older than the last change applied.
    Stale,
    /// The target snapshot does not exist and the event cannot create it.
    NotFound,
    /// The payload failed validation.
    Invalid(String),
    /// No handler consumes this event type.
    Ignored,
}

impl HandleOutcome {
    /// Returns true if the handler committed a change.
    pub fn is_write(&self) -> bool {
        matches!(self, HandleOutcome::Created | HandleOutcome::Applied)
    }

    /// Metric label for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleOutcome::Created => "created",
            HandleOutcome::Applied => "applied",
            HandleOutcome::Duplicate => "duplicate",
            HandleOutcome::Stale => "stale",
            HandleOutcome::NotFound => "not_found",
            HandleOutcome::Invalid(_) => "invalid",
            HandleOutcome::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for HandleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleOutcome::Invalid(reason) => write!(f, "invalid: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}
