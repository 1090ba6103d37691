//! Alert aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, OwnerId, SensorId};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Root, Version};
use crate::validation::ValidationErrors;

use super::{
    AlertAcknowledgedData, AlertError, AlertEvent, AlertKind, AlertRaisedData, AlertResolvedData,
    AlertSeverity, AlertStatus,
};

/// Maximum alert message length, in characters.
pub const MAX_MESSAGE_LEN: usize = 500;

/// Maximum resolution notes length, in characters.
pub const MAX_RESOLUTION_NOTES_LEN: usize = 1000;

/// Input for raising a new alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub sensor_id: SensorId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
}

/// Alert aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    id: Option<AggregateId>,
    sensor_id: Option<SensorId>,
    kind: Option<AlertKind>,
    severity: Option<AlertSeverity>,
    message: String,
    value: Option<f64>,
    threshold: Option<f64>,
    status: AlertStatus,
    raised_at: Option<DateTime<Utc>>,
    acknowledged_at: Option<DateTime<Utc>>,
    acknowledged_by: Option<OwnerId>,
    resolved_at: Option<DateTime<Utc>>,
    resolved_by: Option<OwnerId>,
    resolution_notes: Option<String>,
}

impl Aggregate for Alert {
    type Event = AlertEvent;

    fn aggregate_type() -> &'static str {
        "Alert"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AlertEvent::Raised(data) => {
                self.id = Some(data.alert_id);
                self.sensor_id = Some(data.sensor_id);
                self.kind = Some(data.kind);
                self.severity = Some(data.severity);
                self.message = data.message.clone();
                self.value = data.value;
                self.threshold = data.threshold;
                self.status = AlertStatus::Pending;
                self.raised_at = Some(data.raised_at);
            }
            AlertEvent::Acknowledged(data) => {
                self.status = AlertStatus::Acknowledged;
                self.acknowledged_at = Some(data.acknowledged_at);
                self.acknowledged_by = data.acknowledged_by;
            }
            AlertEvent::Resolved(data) => {
                self.status = AlertStatus::Resolved;
                self.resolved_at = Some(data.resolved_at);
                self.resolved_by = data.resolved_by;
                self.resolution_notes = data.notes.clone();
            }
        }
    }
}

// Query methods
impl Alert {
    pub fn sensor_id(&self) -> Option<SensorId> {
        self.sensor_id
    }

    pub fn kind(&self) -> Option<AlertKind> {
        self.kind
    }

    pub fn severity(&self) -> Option<AlertSeverity> {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Returns the current lifecycle state.
    pub fn status(&self) -> AlertStatus {
        self.status
    }

    pub fn raised_at(&self) -> Option<DateTime<Utc>> {
        self.raised_at
    }

    pub fn acknowledged_at(&self) -> Option<DateTime<Utc>> {
        self.acknowledged_at
    }

    pub fn acknowledged_by(&self) -> Option<OwnerId> {
        self.acknowledged_by
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn resolved_by(&self) -> Option<OwnerId> {
        self.resolved_by
    }

    pub fn resolution_notes(&self) -> Option<&str> {
        self.resolution_notes.as_deref()
    }
}

impl Alert {
    /// Validates `input` and raises a new pending alert.
    pub fn raise(input: NewAlert) -> Result<Root<Alert>, ValidationErrors> {
        Self::raise_at(input, Utc::now())
    }

    /// Validates `input` and raises a new pending alert as of `now`.
    pub fn raise_at(input: NewAlert, now: DateTime<Utc>) -> Result<Root<Alert>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(input.sensor_id.is_nil(), "sensor_id", "must not be empty");

        let message = input.message.trim();
        let message_len = message.chars().count();
        errors.check(message_len == 0, "message", "must not be empty");
        errors.check(
            message_len > MAX_MESSAGE_LEN,
            "message",
            format!("must be at most {MAX_MESSAGE_LEN} characters"),
        );
        errors.check(
            input.value.is_some_and(|v| !v.is_finite()),
            "value",
            "must be a finite number",
        );
        errors.check(
            input.threshold.is_some_and(|v| !v.is_finite()),
            "threshold",
            "must be a finite number",
        );

        let message = message.to_string();
        errors.into_result(|| {
            let mut root: Root<Alert> = Root::new();
            root.record(AlertEvent::Raised(AlertRaisedData {
                alert_id: AggregateId::new(),
                sensor_id: input.sensor_id,
                kind: input.kind,
                severity: input.severity,
                message,
                value: input.value,
                threshold: input.threshold,
                raised_at: now,
            }));
            root
        })
    }

    /// Rebuilds a persisted alert by replaying the events its record implies.
    pub fn restore(record: AlertRecord, version: Version) -> Root<Alert> {
        let mut state = Alert::default();
        state.apply(&AlertEvent::Raised(AlertRaisedData {
            alert_id: record.id,
            sensor_id: record.sensor_id,
            kind: record.kind,
            severity: record.severity,
            message: record.message,
            value: record.value,
            threshold: record.threshold,
            raised_at: record.raised_at,
        }));
        if let Some(acknowledged_at) = record.acknowledged_at {
            state.apply(&AlertEvent::Acknowledged(AlertAcknowledgedData {
                alert_id: record.id,
                acknowledged_by: record.acknowledged_by,
                acknowledged_at,
            }));
        }
        if let Some(resolved_at) = record.resolved_at {
            state.apply(&AlertEvent::Resolved(AlertResolvedData {
                alert_id: record.id,
                resolved_by: record.resolved_by,
                notes: record.resolution_notes,
                resolved_at,
            }));
        }
        Root::rehydrate(state, version)
    }

    /// Flattens a raised alert into its storage form.
    pub fn to_record(&self) -> Option<AlertRecord> {
        Some(AlertRecord {
            id: self.id?,
            sensor_id: self.sensor_id?,
            kind: self.kind?,
            severity: self.severity?,
            message: self.message.clone(),
            value: self.value,
            threshold: self.threshold,
            status: self.status,
            raised_at: self.raised_at?,
            acknowledged_at: self.acknowledged_at,
            acknowledged_by: self.acknowledged_by,
            resolved_at: self.resolved_at,
            resolved_by: self.resolved_by,
            resolution_notes: self.resolution_notes.clone(),
        })
    }
}

// Behaviors
impl Root<Alert> {
    /// Marks a pending alert as seen.
    pub fn acknowledge(&mut self, by: Option<OwnerId>) -> Result<(), AlertError> {
        self.acknowledge_at(by, Utc::now())
    }

    pub fn acknowledge_at(
        &mut self,
        by: Option<OwnerId>,
        now: DateTime<Utc>,
    ) -> Result<(), AlertError> {
        let (alert_id, status) = self.identity();
        if !status.can_acknowledge() {
            return Err(AlertError::InvalidStateTransition {
                current_state: status,
                action: "acknowledge",
            });
        }

        self.record(AlertEvent::Acknowledged(AlertAcknowledgedData {
            alert_id,
            acknowledged_by: by,
            acknowledged_at: now,
        }));
        Ok(())
    }

    /// Closes an alert that is not already resolved.
    pub fn resolve(&mut self, by: Option<OwnerId>, notes: Option<String>) -> Result<(), AlertError> {
        self.resolve_at(by, notes, Utc::now())
    }

    pub fn resolve_at(
        &mut self,
        by: Option<OwnerId>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AlertError> {
        let (alert_id, status) = self.identity();
        if !status.can_resolve() {
            return Err(AlertError::InvalidStateTransition {
                current_state: status,
                action: "resolve",
            });
        }

        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let len = notes.as_ref().map_or(0, |n| n.chars().count());
        if len > MAX_RESOLUTION_NOTES_LEN {
            return Err(AlertError::NotesTooLong {
                len,
                max: MAX_RESOLUTION_NOTES_LEN,
            });
        }

        self.record(AlertEvent::Resolved(AlertResolvedData {
            alert_id,
            resolved_by: by,
            notes,
            resolved_at: now,
        }));
        Ok(())
    }

    fn identity(&self) -> (AggregateId, AlertStatus) {
        (self.id.unwrap_or_default(), self.status)
    }
}

/// Storage form of an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: AggregateId,
    pub sensor_id: SensorId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
    pub status: AlertStatus,
    pub raised_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<OwnerId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<OwnerId>,
    pub resolution_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DomainEvent;

    fn new_alert() -> NewAlert {
        NewAlert {
            sensor_id: SensorId::new(),
            kind: AlertKind::HighTemperature,
            severity: AlertSeverity::High,
            message: "Temperature 45.2 exceeds 40".to_string(),
            value: Some(45.2),
            threshold: Some(40.0),
        }
    }

    fn raised() -> Root<Alert> {
        let mut root = Alert::raise(new_alert()).unwrap();
        root.mark_committed();
        root
    }

    #[test]
    fn raise_creates_a_pending_alert_with_one_event() {
        let root = Alert::raise(new_alert()).unwrap();

        assert_eq!(root.status(), AlertStatus::Pending);
        assert_eq!(root.kind(), Some(AlertKind::HighTemperature));
        assert_eq!(root.uncommitted_events().len(), 1);
        assert_eq!(root.uncommitted_events()[0].event_type(), "AlertRaised");
    }

    #[test]
    fn raise_validates_message_length() {
        let mut input = new_alert();
        input.message = "   ".to_string();
        assert!(Alert::raise(input).unwrap_err().has_field("message"));

        let mut input = new_alert();
        input.message = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(Alert::raise(input).unwrap_err().has_field("message"));

        let mut input = new_alert();
        input.message = "é".repeat(MAX_MESSAGE_LEN);
        assert!(Alert::raise(input).is_ok());
    }

    #[test]
    fn raise_rejects_nil_sensor_and_nan_values() {
        let mut input = new_alert();
        input.sensor_id = SensorId::from_uuid(uuid::Uuid::nil());
        input.value = Some(f64::NAN);

        let errors = Alert::raise(input).unwrap_err();
        assert!(errors.has_field("sensor_id"));
        assert!(errors.has_field("value"));
    }

    #[test]
    fn acknowledge_then_resolve() {
        let mut root = raised();
        let operator = OwnerId::new();

        root.acknowledge(Some(operator)).unwrap();
        root.resolve(Some(operator), Some("  fan replaced  ".to_string()))
            .unwrap();

        assert_eq!(root.status(), AlertStatus::Resolved);
        assert_eq!(root.acknowledged_by(), Some(operator));
        assert_eq!(root.resolution_notes(), Some("fan replaced"));
        assert_eq!(root.uncommitted_events().len(), 2);
    }

    #[test]
    fn pending_alert_can_be_resolved_directly() {
        let mut root = raised();
        root.resolve(None, None).unwrap();
        assert_eq!(root.status(), AlertStatus::Resolved);
        assert!(root.acknowledged_at().is_none());
    }

    #[test]
    fn acknowledge_requires_pending() {
        let mut root = raised();
        root.acknowledge(None).unwrap();
        root.mark_committed();

        let result = root.acknowledge(None);

        assert!(matches!(
            result,
            Err(AlertError::InvalidStateTransition {
                current_state: AlertStatus::Acknowledged,
                action: "acknowledge"
            })
        ));
        assert!(!root.has_uncommitted_events());
    }

    #[test]
    fn resolve_twice_fails_without_partial_state() {
        let mut root = raised();
        root.resolve(None, Some("done".to_string())).unwrap();
        root.mark_committed();
        let before = root.state().clone();

        let result = root.resolve(None, Some("again".to_string()));

        assert!(result.is_err());
        assert_eq!(root.state(), &before);
        assert!(!root.has_uncommitted_events());
    }

    #[test]
    fn resolve_rejects_long_notes() {
        let mut root = raised();
        let result = root.resolve(None, Some("n".repeat(MAX_RESOLUTION_NOTES_LEN + 1)));

        assert!(matches!(result, Err(AlertError::NotesTooLong { .. })));
        assert_eq!(root.status(), AlertStatus::Pending);
    }

    #[test]
    fn restore_replays_lifecycle() {
        let mut root = raised();
        root.acknowledge(None).unwrap();
        root.resolve(None, Some("ok".to_string())).unwrap();
        root.mark_committed();
        let record = root.to_record().unwrap();

        let restored = Alert::restore(record, root.version());

        assert_eq!(restored.state(), root.state());
        assert_eq!(restored.version(), Version::new(3));
    }
}
