//! Alert lifecycle use cases.

use std::sync::Arc;

use common::{AggregateId, SensorId};
use domain::{Alert, AlertRecord, NewAlert, Root};
use store::{AlertStore, ChangeSet, Liveness, SensorSnapshotStore, Store, UnitOfWork};

use crate::mapping::stage_alert_events;
use crate::{IngestError, OperationContext, Result};

/// Raises, acknowledges and resolves alerts, publishing each step.
pub struct AlertService<S> {
    store: Arc<S>,
}

impl<S: Store> AlertService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Raises an alert against a known sensor.
    ///
    /// The sensor may be inactive; operators flag sensors under maintenance too.
    #[tracing::instrument(skip(self, input, ctx), fields(sensor_id = %input.sensor_id, correlation_id = %ctx.correlation_id))]
    pub async fn raise(&self, input: NewAlert, ctx: &OperationContext) -> Result<Root<Alert>> {
        let sensor_id = input.sensor_id;
        let alert = Alert::raise(input)?;

        if !self
            .store
            .sensor_exists(sensor_id, Liveness::IncludeInactive)
            .await?
        {
            return Err(IngestError::SensorNotFound(sensor_id));
        }

        self.save(alert, ctx, "RaiseAlert").await
    }

    /// Acknowledges a pending alert.
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn acknowledge(&self, alert_id: AggregateId, ctx: &OperationContext) -> Result<Root<Alert>> {
        let mut alert = self.load(alert_id).await?;
        alert.acknowledge(ctx.actor)?;
        self.save(alert, ctx, "AcknowledgeAlert").await
    }

    /// Resolves an alert that is not already resolved.
    #[tracing::instrument(skip(self, notes, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn resolve(
        &self,
        alert_id: AggregateId,
        notes: Option<String>,
        ctx: &OperationContext,
    ) -> Result<Root<Alert>> {
        let mut alert = self.load(alert_id).await?;
        alert.resolve(ctx.actor, notes)?;
        self.save(alert, ctx, "ResolveAlert").await
    }

    /// Returns a sensor's alerts, newest first.
    pub async fn alerts_for_sensor(&self, sensor_id: SensorId) -> Result<Vec<AlertRecord>> {
        Ok(self.store.alerts_for_sensor(sensor_id).await?)
    }

    async fn load(&self, alert_id: AggregateId) -> Result<Root<Alert>> {
        self.store
            .get_alert(alert_id)
            .await?
            .ok_or(IngestError::AlertNotFound(alert_id))
    }

    async fn save(&self, mut alert: Root<Alert>, ctx: &OperationContext, source: &str) -> Result<Root<Alert>> {
        let mut changes = ChangeSet::new();
        changes.save_alert(&alert)?;
        stage_alert_events(&mut changes, &alert, ctx, source)?;
        self.store.commit(changes).await?;

        alert.mark_committed();
        tracing::info!(status = %alert.status(), version = %alert.version(), "alert saved");
        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{OwnerId, PlotId, PropertyId};
    use domain::{
        Aggregate, AlertError, AlertKind, AlertSeverity, AlertStatus, OperationalStatus,
        SensorDetails, SensorSnapshot, Version,
    };
    use store::{InMemoryStore, StoreError};

    async fn setup() -> (AlertService<InMemoryStore>, Arc<InMemoryStore>, SensorId) {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let snapshot = SensorSnapshot::register(
            SensorId::new(),
            SensorDetails {
                owner_id: OwnerId::new(),
                property_id: PropertyId::new(),
                plot_id: PlotId::new(),
                label: Some("Weather mast".to_string()),
                plot_name: "Ridge".to_string(),
                property_name: "Herdade".to_string(),
            },
            OperationalStatus::Maintenance,
            now,
            now,
        );
        let sensor_id = snapshot.id;
        let mut changes = ChangeSet::new();
        changes.add_sensor(snapshot);
        store.commit(changes).await.unwrap();
        (AlertService::new(Arc::clone(&store)), store, sensor_id)
    }

    fn new_alert(sensor_id: SensorId) -> NewAlert {
        NewAlert {
            sensor_id,
            kind: AlertKind::Custom,
            severity: AlertSeverity::Low,
            message: "Mast leaning after storm".to_string(),
            value: None,
            threshold: None,
        }
    }

    fn staged_types(entries: &[store::OutboxEntry]) -> Vec<String> {
        entries.iter().map(|e| e.envelope.event_type.clone()).collect()
    }

    #[tokio::test]
    async fn full_lifecycle_stages_one_event_per_step() {
        let (service, store, sensor_id) = setup().await;
        let operator = OwnerId::new();
        let ctx = OperationContext::new().with_actor(operator);

        let raised = service.raise(new_alert(sensor_id), &ctx).await.unwrap();
        let alert_id = raised.id().unwrap();
        assert_eq!(raised.version(), Version::new(1));

        let acknowledged = service.acknowledge(alert_id, &ctx).await.unwrap();
        assert_eq!(acknowledged.acknowledged_by(), Some(operator));

        let resolved = service
            .resolve(alert_id, Some("Re-anchored".to_string()), &ctx)
            .await
            .unwrap();
        assert_eq!(resolved.status(), AlertStatus::Resolved);
        assert_eq!(resolved.version(), Version::new(3));
        assert!(!resolved.has_uncommitted_events());

        assert_eq!(
            staged_types(&store.outbox_entries().await),
            ["AlertRaised", "AlertAcknowledged", "AlertResolved"]
        );
        assert_eq!(service.alerts_for_sensor(sensor_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn raising_for_unknown_sensor_fails() {
        let (service, store, _) = setup().await;
        let unknown = SensorId::new();

        let err = service
            .raise(new_alert(unknown), &OperationContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::SensorNotFound(id) if id == unknown));
        assert!(store.outbox_entries().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_transition_writes_nothing() {
        let (service, store, sensor_id) = setup().await;
        let ctx = OperationContext::new();
        let alert_id = service.raise(new_alert(sensor_id), &ctx).await.unwrap().id().unwrap();
        service.resolve(alert_id, None, &ctx).await.unwrap();
        let staged = store.outbox_entries().await.len();

        let err = service.acknowledge(alert_id, &ctx).await.unwrap_err();

        assert!(matches!(
            err,
            IngestError::Alert(AlertError::InvalidStateTransition { .. })
        ));
        assert_eq!(store.outbox_entries().await.len(), staged);
    }

    #[tokio::test]
    async fn missing_alert_is_not_found() {
        let (service, _, _) = setup().await;
        let id = AggregateId::new();

        let err = service
            .acknowledge(id, &OperationContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::AlertNotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn stale_root_conflicts_on_commit() {
        let (service, store, sensor_id) = setup().await;
        let ctx = OperationContext::new();
        let alert_id = service.raise(new_alert(sensor_id), &ctx).await.unwrap().id().unwrap();

        let mut stale = store.get_alert(alert_id).await.unwrap().unwrap();
        service.acknowledge(alert_id, &ctx).await.unwrap();

        stale.resolve(None, None).unwrap();
        let mut changes = ChangeSet::new();
        changes.save_alert(&stale).unwrap();

        assert!(matches!(
            store.commit(changes).await,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
    }
}
