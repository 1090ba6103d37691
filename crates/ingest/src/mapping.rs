//! Domain events to integration events.
//!
//! Domain events stay inside this service. Each one that other services care
//! about is translated here into its public contract and staged in the
//! outbox alongside the aggregate write.

use contracts::{
    AlertAcknowledged, AlertRaised, AlertResolved, ContractError, EventEnvelope, EventId,
    IntegrationEvent, SensorIngested,
};
use domain::{Alert, AlertEvent, ReadingEvent, Root, SensorReading};
use store::ChangeSet;

use crate::OperationContext;

/// Translates a reading event.
pub fn sensor_ingested(event: &ReadingEvent) -> SensorIngested {
    match event {
        ReadingEvent::Recorded(data) => SensorIngested {
            event_id: EventId::new(),
            occurred_on: data.recorded_at,
            sensor_reading_id: data.reading_id,
            sensor_id: data.sensor_id,
            time: data.time,
            temperature: data.metrics.temperature,
            humidity: data.metrics.humidity,
            soil_moisture: data.metrics.soil_moisture,
            rainfall: data.metrics.rainfall,
            battery_level: data.metrics.battery_level,
        },
    }
}

/// Wraps `event` and adds it to the outbox of `changes`.
pub fn stage<E: IntegrationEvent>(
    changes: &mut ChangeSet,
    event: &E,
    ctx: &OperationContext,
    source: &str,
) -> Result<(), ContractError> {
    changes.enqueue(EventEnvelope::wrap(event, ctx.correlation_id, source)?);
    Ok(())
}

/// Stages one integration event per uncommitted reading event.
pub fn stage_reading_events(
    changes: &mut ChangeSet,
    reading: &Root<SensorReading>,
    ctx: &OperationContext,
    source: &str,
) -> Result<usize, ContractError> {
    for event in reading.uncommitted_events() {
        stage(changes, &sensor_ingested(event), ctx, source)?;
    }
    Ok(reading.uncommitted_events().len())
}

/// Stages one integration event per uncommitted alert event.
pub fn stage_alert_events(
    changes: &mut ChangeSet,
    alert: &Root<Alert>,
    ctx: &OperationContext,
    source: &str,
) -> Result<usize, ContractError> {
    let sensor_id = alert.sensor_id().ok_or(ContractError::MissingField("sensor_id"))?;

    for event in alert.uncommitted_events() {
        match event {
            AlertEvent::Raised(data) => {
                let raised = AlertRaised {
                    event_id: EventId::new(),
                    occurred_on: data.raised_at,
                    alert_id: data.alert_id,
                    sensor_id: data.sensor_id,
                    kind: data.kind.as_str().to_string(),
                    severity: data.severity.as_str().to_string(),
                    message: data.message.clone(),
                    value: data.value,
                    threshold: data.threshold,
                };
                stage(changes, &raised, ctx, source)?;
            }
            AlertEvent::Acknowledged(data) => {
                let acknowledged = AlertAcknowledged {
                    event_id: EventId::new(),
                    occurred_on: data.acknowledged_at,
                    alert_id: data.alert_id,
                    sensor_id,
                    acknowledged_by: data.acknowledged_by,
                };
                stage(changes, &acknowledged, ctx, source)?;
            }
            AlertEvent::Resolved(data) => {
                let resolved = AlertResolved {
                    event_id: EventId::new(),
                    occurred_on: data.resolved_at,
                    alert_id: data.alert_id,
                    sensor_id,
                    resolved_by: data.resolved_by,
                    notes: data.notes.clone(),
                };
                stage(changes, &resolved, ctx, source)?;
            }
        }
    }
    Ok(alert.uncommitted_events().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use common::{OwnerId, SensorId};
    use domain::{Aggregate, AlertKind, AlertSeverity, NewAlert, NewReading, ReadingMetrics};

    fn reading() -> Root<SensorReading> {
        SensorReading::create(NewReading {
            sensor_id: SensorId::new(),
            time: Utc::now() - Duration::minutes(1),
            metrics: ReadingMetrics {
                temperature: Some(21.5),
                battery_level: Some(88.0),
                ..Default::default()
            },
        })
        .unwrap()
    }

    #[test]
    fn reading_maps_to_sensor_ingested() {
        let reading = reading();
        let event = sensor_ingested(&reading.uncommitted_events()[0]);

        assert_eq!(Some(event.sensor_reading_id), reading.id());
        assert_eq!(Some(event.sensor_id), reading.sensor_id());
        assert_eq!(event.temperature, Some(21.5));
        assert_eq!(event.humidity, None);
        assert_eq!(Some(event.occurred_on), reading.recorded_at());
    }

    #[test]
    fn staged_envelopes_carry_correlation_and_source() {
        let reading = reading();
        let ctx = OperationContext::new();
        let mut changes = ChangeSet::new();

        let staged = stage_reading_events(&mut changes, &reading, &ctx, "IngestReading").unwrap();

        assert_eq!(staged, 1);
        let envelope = changes.staged_events().next().unwrap();
        assert_eq!(envelope.event_type, "SensorIngested");
        assert_eq!(envelope.correlation_id, ctx.correlation_id);
        assert_eq!(envelope.source, "IngestReading");
        let decoded: SensorIngested = envelope.decode().unwrap();
        assert_eq!(decoded.event_id, envelope.event_id);
    }

    #[test]
    fn alert_lifecycle_maps_each_event() {
        let sensor_id = SensorId::new();
        let mut alert = Alert::raise(NewAlert {
            sensor_id,
            kind: AlertKind::LowBattery,
            severity: AlertSeverity::Medium,
            message: "Battery at 9%".to_string(),
            value: Some(9.0),
            threshold: Some(15.0),
        })
        .unwrap();
        alert.acknowledge(Some(OwnerId::new())).unwrap();
        alert.resolve(None, Some("Battery swapped".to_string())).unwrap();

        let mut changes = ChangeSet::new();
        let staged =
            stage_alert_events(&mut changes, &alert, &OperationContext::new(), "test").unwrap();

        assert_eq!(staged, 3);
        let types: Vec<_> = changes.staged_events().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, ["AlertRaised", "AlertAcknowledged", "AlertResolved"]);

        let resolved: AlertResolved = changes.staged_events().nth(2).unwrap().decode().unwrap();
        assert_eq!(resolved.sensor_id, sensor_id);
        assert_eq!(resolved.notes.as_deref(), Some("Battery swapped"));
    }
}
