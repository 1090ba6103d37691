//! Integration event payloads.
//!
//! Field names are part of the public contract. New fields must be optional
//! so older producers keep deserializing; unknown fields are ignored.

use chrono::{DateTime, Utc};
use common::{AggregateId, EventId, OwnerId, PlotId, PropertyId, SensorId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::envelope::EventEnvelope;
use crate::error::ContractError;

/// A versioned, serializable cross-service message.
pub trait IntegrationEvent: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Wire name of the event.
    const EVENT_TYPE: &'static str;

    /// Contract version of the payload.
    const SCHEMA_VERSION: u16 = 1;

    /// Unique identifier of this occurrence.
    fn event_id(&self) -> EventId;

    /// When the event happened at the producer.
    fn occurred_on(&self) -> DateTime<Utc>;

    /// The aggregate the event is about.
    fn aggregate_id(&self) -> AggregateId;
}

macro_rules! integration_event {
    ($ty:ident, $name:literal, |$e:ident| $aggregate:expr) => {
        impl IntegrationEvent for $ty {
            const EVENT_TYPE: &'static str = $name;

            fn event_id(&self) -> EventId {
                self.event_id
            }

            fn occurred_on(&self) -> DateTime<Utc> {
                self.occurred_on
            }

            fn aggregate_id(&self) -> AggregateId {
                let $e = self;
                AggregateId::from_uuid($aggregate)
            }
        }
    };
}

/// A sensor reading was accepted into the time-series store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorIngested {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub sensor_reading_id: AggregateId,
    pub sensor_id: SensorId,
    pub time: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub rainfall: Option<f64>,
    pub battery_level: Option<f64>,
}

integration_event!(SensorIngested, "SensorIngested", |e| e.sensor_reading_id.as_uuid());

/// The farm service registered a sensor on a plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRegistered {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub sensor_id: SensorId,
    pub owner_id: OwnerId,
    pub property_id: PropertyId,
    pub plot_id: PlotId,
    pub label: Option<String>,
    pub plot_name: String,
    pub property_name: String,
    pub status: String,
}

integration_event!(SensorRegistered, "SensorRegistered", |e| e.sensor_id.as_uuid());

/// The farm service deactivated a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDeactivated {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub sensor_id: SensorId,
    pub plot_id: PlotId,
    pub property_id: PropertyId,
    pub reason: Option<String>,
    pub deactivated_by_user_id: Option<OwnerId>,
}

integration_event!(SensorDeactivated, "SensorDeactivated", |e| e.sensor_id.as_uuid());

/// The farm service changed a sensor's operational status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorOperationalStatusChanged {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub sensor_id: SensorId,
    pub previous_status: String,
    pub new_status: String,
    pub reason: Option<String>,
    pub changed_by_user_id: Option<OwnerId>,
}

integration_event!(
    SensorOperationalStatusChanged,
    "SensorOperationalStatusChanged",
    |e| e.sensor_id.as_uuid()
);

/// The identity service created a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub owner_id: OwnerId,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
}

integration_event!(UserCreated, "UserCreated", |e| e.owner_id.as_uuid());

/// The identity service updated a user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdated {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub owner_id: OwnerId,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
}

integration_event!(UserUpdated, "UserUpdated", |e| e.owner_id.as_uuid());

/// The identity service deactivated a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDeactivated {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub owner_id: OwnerId,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
}

integration_event!(UserDeactivated, "UserDeactivated", |e| e.owner_id.as_uuid());

/// An alert was raised against a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRaised {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub alert_id: AggregateId,
    pub sensor_id: SensorId,
    pub kind: String,
    pub severity: String,
    pub message: String,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
}

integration_event!(AlertRaised, "AlertRaised", |e| e.alert_id.as_uuid());

/// An alert was acknowledged by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAcknowledged {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub alert_id: AggregateId,
    pub sensor_id: SensorId,
    pub acknowledged_by: Option<OwnerId>,
}

integration_event!(AlertAcknowledged, "AlertAcknowledged", |e| e.alert_id.as_uuid());

/// An alert was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertResolved {
    pub event_id: EventId,
    pub occurred_on: DateTime<Utc>,
    pub alert_id: AggregateId,
    pub sensor_id: SensorId,
    pub resolved_by: Option<OwnerId>,
    pub notes: Option<String>,
}

integration_event!(AlertResolved, "AlertResolved", |e| e.alert_id.as_uuid());

/// Every integration message this service knows, as one sum type.
///
/// Consumers decode an envelope into this type and `match` on it, which keeps
/// one handler per event type without dynamic dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationMessage {
    SensorIngested(SensorIngested),
    SensorRegistered(SensorRegistered),
    SensorDeactivated(SensorDeactivated),
    SensorOperationalStatusChanged(SensorOperationalStatusChanged),
    UserCreated(UserCreated),
    UserUpdated(UserUpdated),
    UserDeactivated(UserDeactivated),
    AlertRaised(AlertRaised),
    AlertAcknowledged(AlertAcknowledged),
    AlertResolved(AlertResolved),
}

impl IntegrationMessage {
    /// Decodes an envelope into the matching variant.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, ContractError> {
        let message = match envelope.event_type.as_str() {
            SensorIngested::EVENT_TYPE => Self::SensorIngested(envelope.decode()?),
            SensorRegistered::EVENT_TYPE => Self::SensorRegistered(envelope.decode()?),
            SensorDeactivated::EVENT_TYPE => Self::SensorDeactivated(envelope.decode()?),
            SensorOperationalStatusChanged::EVENT_TYPE => {
                Self::SensorOperationalStatusChanged(envelope.decode()?)
            }
            UserCreated::EVENT_TYPE => Self::UserCreated(envelope.decode()?),
            UserUpdated::EVENT_TYPE => Self::UserUpdated(envelope.decode()?),
            UserDeactivated::EVENT_TYPE => Self::UserDeactivated(envelope.decode()?),
            AlertRaised::EVENT_TYPE => Self::AlertRaised(envelope.decode()?),
            AlertAcknowledged::EVENT_TYPE => Self::AlertAcknowledged(envelope.decode()?),
            AlertResolved::EVENT_TYPE => Self::AlertResolved(envelope.decode()?),
            other => return Err(ContractError::UnknownEventType(other.to_string())),
        };
        Ok(message)
    }

    /// Returns the wire name of the wrapped event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SensorIngested(_) => SensorIngested::EVENT_TYPE,
            Self::SensorRegistered(_) => SensorRegistered::EVENT_TYPE,
            Self::SensorDeactivated(_) => SensorDeactivated::EVENT_TYPE,
            Self::SensorOperationalStatusChanged(_) => SensorOperationalStatusChanged::EVENT_TYPE,
            Self::UserCreated(_) => UserCreated::EVENT_TYPE,
            Self::UserUpdated(_) => UserUpdated::EVENT_TYPE,
            Self::UserDeactivated(_) => UserDeactivated::EVENT_TYPE,
            Self::AlertRaised(_) => AlertRaised::EVENT_TYPE,
            Self::AlertAcknowledged(_) => AlertAcknowledged::EVENT_TYPE,
            Self::AlertResolved(_) => AlertResolved::EVENT_TYPE,
        }
    }
}
