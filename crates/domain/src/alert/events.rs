//! Alert domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, OwnerId, SensorId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{AlertKind, AlertSeverity};

/// Events that can occur on an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AlertEvent {
    /// Alert was raised.
    Raised(AlertRaisedData),

    /// An operator acknowledged the alert.
    Acknowledged(AlertAcknowledgedData),

    /// The alert was resolved.
    Resolved(AlertResolvedData),
}

impl DomainEvent for AlertEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AlertEvent::Raised(_) => "AlertRaised",
            AlertEvent::Acknowledged(_) => "AlertAcknowledged",
            AlertEvent::Resolved(_) => "AlertResolved",
        }
    }

    fn occurred_on(&self) -> DateTime<Utc> {
        match self {
            AlertEvent::Raised(data) => data.raised_at,
            AlertEvent::Acknowledged(data) => data.acknowledged_at,
            AlertEvent::Resolved(data) => data.resolved_at,
        }
    }
}

impl AlertEvent {
    /// Returns the alert this event belongs to.
    pub fn alert_id(&self) -> AggregateId {
        match self {
            AlertEvent::Raised(data) => data.alert_id,
            AlertEvent::Acknowledged(data) => data.alert_id,
            AlertEvent::Resolved(data) => data.alert_id,
        }
    }
}

/// Data for the AlertRaised event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRaisedData {
    pub alert_id: AggregateId,
    pub sensor_id: SensorId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,

    /// The observed value that triggered the alert.
    pub value: Option<f64>,

    /// The threshold that was crossed.
    pub threshold: Option<f64>,

    pub raised_at: DateTime<Utc>,
}

/// Data for the AlertAcknowledged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAcknowledgedData {
    pub alert_id: AggregateId,
    pub acknowledged_by: Option<OwnerId>,
    pub acknowledged_at: DateTime<Utc>,
}

/// Data for the AlertResolved event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertResolvedData {
    pub alert_id: AggregateId,
    pub resolved_by: Option<OwnerId>,
    pub notes: Option<String>,
    pub resolved_at: DateTime<Utc>,
}
