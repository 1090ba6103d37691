//! Staged writes for one atomic commit.

use chrono::{DateTime, Utc};
use common::{OwnerId, SensorId};
use contracts::EventEnvelope;
use domain::{
    Aggregate, Alert, AlertRecord, OwnerSnapshot, ReadingRecord, Root, SensorReading,
    SensorSnapshot, Version,
};

use crate::{OutboxEntry, Result, StoreError};

/// A staged write to one snapshot table.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotWrite<S, Id> {
    /// Insert a new snapshot. Ignored if the id already exists.
    Add(S),
    /// Overwrite an existing snapshot. Ignored if the id does not exist.
    Update(S),
    /// Soft delete reported at `occurred_on`. Ignored if the snapshot is
    /// missing or already deactivated.
    Delete {
        id: Id,
        occurred_on: DateTime<Utc>,
        at: DateTime<Utc>,
    },
}

/// A staged alert save, checked against the stored version.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertWrite {
    pub record: AlertRecord,
    pub expected_version: Version,
    pub new_version: Version,
}

/// Every write of one use case or handler invocation.
///
/// Nothing is visible to readers until the change set is passed to
/// [`crate::UnitOfWork::commit`]. Dropping it discards the staged writes.
#[derive(Debug, Default)]
#[must_use = "staged writes are discarded unless the change set is committed"]
pub struct ChangeSet {
    pub(crate) readings: Vec<ReadingRecord>,
    pub(crate) alerts: Vec<AlertWrite>,
    pub(crate) sensors: Vec<SnapshotWrite<SensorSnapshot, SensorId>>,
    pub(crate) owners: Vec<SnapshotWrite<OwnerSnapshot, OwnerId>>,
    pub(crate) outbox: Vec<OutboxEntry>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a newly recorded reading.
    pub fn add_reading(&mut self, reading: &Root<SensorReading>) -> Result<()> {
        let record = reading
            .to_record()
            .ok_or(StoreError::Uninitialized(SensorReading::aggregate_type()))?;
        self.readings.push(record);
        Ok(())
    }

    /// Stages an alert with its pending events applied.
    ///
    /// The commit fails with a concurrency conflict if the stored alert is
    /// no longer at the version this root was loaded at.
    pub fn save_alert(&mut self, alert: &Root<Alert>) -> Result<()> {
        let record = alert
            .to_record()
            .ok_or(StoreError::Uninitialized(Alert::aggregate_type()))?;
        self.alerts.push(AlertWrite {
            record,
            expected_version: alert.version(),
            new_version: alert.pending_version(),
        });
        Ok(())
    }

    pub fn add_sensor(&mut self, snapshot: SensorSnapshot) {
        self.sensors.push(SnapshotWrite::Add(snapshot));
    }

    pub fn update_sensor(&mut self, snapshot: SensorSnapshot) {
        self.sensors.push(SnapshotWrite::Update(snapshot));
    }

    pub fn delete_sensor(&mut self, id: SensorId, occurred_on: DateTime<Utc>, at: DateTime<Utc>) {
        self.sensors.push(SnapshotWrite::Delete { id, occurred_on, at });
    }

    pub fn add_owner(&mut self, snapshot: OwnerSnapshot) {
        self.owners.push(SnapshotWrite::Add(snapshot));
    }

    pub fn update_owner(&mut self, snapshot: OwnerSnapshot) {
        self.owners.push(SnapshotWrite::Update(snapshot));
    }

    pub fn delete_owner(&mut self, id: OwnerId, occurred_on: DateTime<Utc>, at: DateTime<Utc>) {
        self.owners.push(SnapshotWrite::Delete { id, occurred_on, at });
    }

    /// Stages an integration event for publication after commit.
    pub fn enqueue(&mut self, envelope: EventEnvelope) {
        self.outbox.push(OutboxEntry::new(envelope));
    }

    /// Returns the staged outbox envelopes, in staging order.
    pub fn staged_events(&self) -> impl Iterator<Item = &EventEnvelope> {
        self.outbox.iter().map(|entry| &entry.envelope)
    }

    /// Returns the number of staged writes, outbox entries included.
    pub fn len(&self) -> usize {
        self.readings.len()
            + self.alerts.len()
            + self.sensors.len()
            + self.owners.len()
            + self.outbox.len()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
