use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use contracts::{SensorDeactivated, SensorOperationalStatusChanged, SensorRegistered};
use domain::{OperationalStatus, SensorDetails, SensorSnapshot};
use store::{ChangeSet, Liveness, SensorSnapshotStore, UnitOfWork};

use super::{InboxHandler, MAX_NAME_LEN, commit, exceeds, invalid, is_blank, skipped};
use crate::{HandleOutcome, MessageContext, Result, StalenessPolicy};

/// Creates the sensor snapshot, or refreshes its details on re-registration.
///
/// Re-registration never changes liveness; that is driven by status events.
pub struct SensorRegisteredHandler<S> {
    store: Arc<S>,
}

impl<S> SensorRegisteredHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

fn validate_registration(event: &SensorRegistered) -> std::result::Result<OperationalStatus, String> {
    if event.sensor_id.is_nil() {
        return Err("sensor_id is nil".to_string());
    }
    if event.owner_id.is_nil() || event.property_id.is_nil() || event.plot_id.is_nil() {
        return Err("owner, property and plot ids are required".to_string());
    }
    if is_blank(&event.plot_name) || is_blank(&event.property_name) {
        return Err("plot and property names are required".to_string());
    }
    let names = [Some(&event.plot_name), Some(&event.property_name), event.label.as_ref()];
    if names.into_iter().flatten().any(|name| exceeds(name, MAX_NAME_LEN)) {
        return Err(format!("names are limited to {MAX_NAME_LEN} characters"));
    }
    event.status.parse().map_err(|e: domain::UnknownVariant| e.to_string())
}

#[async_trait]
impl<S> InboxHandler for SensorRegisteredHandler<S>
where
    S: SensorSnapshotStore + UnitOfWork,
{
    type Event = SensorRegistered;

    fn name(&self) -> &'static str {
        "SensorRegisteredHandler"
    }

    #[tracing::instrument(skip_all, fields(event_id = %ctx.event_id, correlation_id = %ctx.correlation_id, sensor_id = %event.sensor_id))]
    async fn handle(&self, event: &SensorRegistered, ctx: &MessageContext) -> Result<HandleOutcome> {
        let status = match validate_registration(event) {
            Ok(status) => status,
            Err(reason) => return Ok(invalid(ctx, reason)),
        };

        let details = SensorDetails {
            owner_id: event.owner_id,
            property_id: event.property_id,
            plot_id: event.plot_id,
            label: event.label.clone(),
            plot_name: event.plot_name.clone(),
            property_name: event.property_name.clone(),
        };

        let existing = self
            .store
            .get_sensor(event.sensor_id, Liveness::IncludeInactive)
            .await
            .map_err(|e| ctx.fail(event.sensor_id, e))?;

        let now = Utc::now();
        let mut changes = ChangeSet::new();
        let outcome = match existing {
            None => {
                changes.add_sensor(SensorSnapshot::register(
                    event.sensor_id,
                    details,
                    status,
                    event.occurred_on,
                    now,
                ));
                HandleOutcome::Created
            }
            Some(mut snapshot) => {
                if !snapshot.refresh_details(details, now) {
                    return Ok(skipped(ctx, event.sensor_id, HandleOutcome::Duplicate));
                }
                changes.update_sensor(snapshot);
                HandleOutcome::Applied
            }
        };

        commit(self.store.as_ref(), changes, ctx, event.sensor_id).await?;
        tracing::info!(status = %status, outcome = outcome.as_str(), "sensor snapshot registered");
        Ok(outcome)
    }
}

/// Soft-deletes the sensor snapshot, recording it as a change to `Inactive`.
pub struct SensorDeactivatedHandler<S> {
    store: Arc<S>,
}

impl<S> SensorDeactivatedHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> InboxHandler for SensorDeactivatedHandler<S>
where
    S: SensorSnapshotStore + UnitOfWork,
{
    type Event = SensorDeactivated;

    fn name(&self) -> &'static str {
        "SensorDeactivatedHandler"
    }

    #[tracing::instrument(skip_all, fields(event_id = %ctx.event_id, correlation_id = %ctx.correlation_id, sensor_id = %event.sensor_id))]
    async fn handle(&self, event: &SensorDeactivated, ctx: &MessageContext) -> Result<HandleOutcome> {
        if event.sensor_id.is_nil() {
            return Ok(invalid(ctx, "sensor_id is nil"));
        }

        let Some(mut snapshot) = self
            .store
            .get_sensor(event.sensor_id, Liveness::IncludeInactive)
            .await
            .map_err(|e| ctx.fail(event.sensor_id, e))?
        else {
            return Ok(skipped(ctx, event.sensor_id, HandleOutcome::NotFound));
        };

        if snapshot.is_deactivated() {
            return Ok(skipped(ctx, event.sensor_id, HandleOutcome::Duplicate));
        }
        // A status change that happened after this event wins.
        if snapshot.is_older_than_last_change(event.occurred_on) {
            return Ok(skipped(ctx, event.sensor_id, HandleOutcome::Stale));
        }

        snapshot.deactivate(event.reason.clone(), event.occurred_on, Utc::now());
        let mut changes = ChangeSet::new();
        changes.update_sensor(snapshot);

        commit(self.store.as_ref(), changes, ctx, event.sensor_id).await?;
        tracing::info!(reason = ?event.reason, "sensor snapshot deactivated");
        Ok(HandleOutcome::Applied)
    }
}

/// Applies an operational status change, reactivating on `Active`.
pub struct SensorStatusChangedHandler<S> {
    store: Arc<S>,
    policy: StalenessPolicy,
}

impl<S> SensorStatusChangedHandler<S> {
    pub fn new(store: Arc<S>, policy: StalenessPolicy) -> Self {
        Self { store, policy }
    }
}

#[async_trait]
impl<S> InboxHandler for SensorStatusChangedHandler<S>
where
    S: SensorSnapshotStore + UnitOfWork,
{
    type Event = SensorOperationalStatusChanged;

    fn name(&self) -> &'static str {
        "SensorStatusChangedHandler"
    }

    #[tracing::instrument(skip_all, fields(event_id = %ctx.event_id, correlation_id = %ctx.correlation_id, sensor_id = %event.sensor_id))]
    async fn handle(
        &self,
        event: &SensorOperationalStatusChanged,
        ctx: &MessageContext,
    ) -> Result<HandleOutcome> {
        if event.sensor_id.is_nil() {
            return Ok(invalid(ctx, "sensor_id is nil"));
        }
        let status: OperationalStatus = match event.new_status.parse() {
            Ok(status) => status,
            Err(e) => return Ok(invalid(ctx, format!("new_status: {}", e))),
        };

        let Some(mut snapshot) = self
            .store
            .get_sensor(event.sensor_id, Liveness::IncludeInactive)
            .await
            .map_err(|e| ctx.fail(event.sensor_id, e))?
        else {
            if status.is_active() {
                tracing::info!("reactivation for unknown sensor, nothing to reactivate");
            }
            return Ok(skipped(ctx, event.sensor_id, HandleOutcome::NotFound));
        };

        if snapshot.is_duplicate_status(status, event.occurred_on, self.policy.tolerance()) {
            return Ok(skipped(ctx, event.sensor_id, HandleOutcome::Duplicate));
        }
        if snapshot.is_older_than_last_change(event.occurred_on) {
            return Ok(skipped(ctx, event.sensor_id, HandleOutcome::Stale));
        }

        let was_active = snapshot.is_active;
        snapshot.change_status(status, event.reason.clone(), event.occurred_on, Utc::now());
        let mut changes = ChangeSet::new();
        changes.update_sensor(snapshot);

        commit(self.store.as_ref(), changes, ctx, event.sensor_id).await?;
        tracing::info!(
            previous_status = %event.previous_status,
            new_status = %status,
            reactivated = !was_active && status.is_active(),
            "sensor status changed"
        );
        Ok(HandleOutcome::Applied)
    }
}
