use chrono::{DateTime, Utc};
use common::{AggregateId, CorrelationId, EventId};
use serde::{Deserialize, Serialize};

use crate::error::ContractError;
use crate::events::IntegrationEvent;

/// Wire envelope wrapping every integration event.
///
/// The envelope carries the metadata a consumer needs before it decodes the
/// payload: what the event is, which aggregate produced it, which causal
/// chain it belongs to and which use case or handler emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event. Equal to the payload's own event id.
    pub event_id: EventId,

    /// The type of the event (e.g., "SensorRegistered").
    pub event_type: String,

    /// Contract version of the payload.
    pub schema_version: u16,

    /// The aggregate that produced the event.
    pub aggregate_id: AggregateId,

    /// Propagated across every event of one causal chain.
    pub correlation_id: CorrelationId,

    /// Name of the producing use case or handler.
    pub source: String,

    /// When the event happened at the producer.
    pub occurred_on: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Creates a new envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Wraps a typed integration event, copying its identity and timestamp.
    pub fn wrap<E: IntegrationEvent>(
        event: &E,
        correlation_id: CorrelationId,
        source: impl Into<String>,
    ) -> Result<Self, ContractError> {
        EventEnvelope::builder()
            .event_id(event.event_id())
            .event_type(E::EVENT_TYPE)
            .schema_version(E::SCHEMA_VERSION)
            .aggregate_id(event.aggregate_id())
            .correlation_id(correlation_id)
            .source(source)
            .occurred_on(event.occurred_on())
            .payload(event)?
            .build()
    }

    /// Decodes the payload as `E`, refusing envelopes of another type.
    pub fn decode<E: IntegrationEvent>(&self) -> Result<E, ContractError> {
        if self.event_type != E::EVENT_TYPE {
            return Err(ContractError::TypeMismatch {
                expected: E::EVENT_TYPE,
                actual: self.event_type.clone(),
            });
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    schema_version: Option<u16>,
    aggregate_id: Option<AggregateId>,
    correlation_id: Option<CorrelationId>,
    source: Option<String>,
    occurred_on: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the schema version. Defaults to 1.
    pub fn schema_version(mut self, version: u16) -> Self {
        self.schema_version = Some(version);
        self
    }

    /// Sets the producing aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the correlation ID.
    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Sets the producing use case or handler name.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the occurrence timestamp. If not set, the current time will be used.
    pub fn occurred_on(mut self, occurred_on: DateTime<Utc>) -> Self {
        self.occurred_on = Some(occurred_on);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the envelope.
    ///
    /// Fails when event type, aggregate id, correlation id, a non-empty source
    /// or the payload are missing.
    pub fn build(self) -> Result<EventEnvelope, ContractError> {
        let source = self
            .source
            .filter(|s| !s.trim().is_empty())
            .ok_or(ContractError::MissingField("source"))?;

        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self
                .event_type
                .ok_or(ContractError::MissingField("event_type"))?,
            schema_version: self.schema_version.unwrap_or(1),
            aggregate_id: self
                .aggregate_id
                .ok_or(ContractError::MissingField("aggregate_id"))?,
            correlation_id: self
                .correlation_id
                .ok_or(ContractError::MissingField("correlation_id"))?,
            source,
            occurred_on: self.occurred_on.unwrap_or_else(Utc::now),
            payload: self.payload.ok_or(ContractError::MissingField("payload"))?,
        })
    }
}
