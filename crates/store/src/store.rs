use std::time::Duration;

use async_trait::async_trait;
use common::{AggregateId, OwnerId, SensorId};
use domain::{Alert, AlertRecord, OwnerSnapshot, ReadingRecord, Root, SensorSnapshot};
use uuid::Uuid;

use crate::{ChangeSet, Liveness, OutboxEntry, OutboxStatus, ReadingQuery, Result};

/// What a successful commit wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Staged writes applied, outbox entries excluded.
    pub writes: usize,
    /// Outbox entries staged.
    pub outbox_entries: usize,
}

/// The atomic commit boundary.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Applies every staged write in one local transaction.
    ///
    /// Either every write becomes visible or none does. Snapshot adds are
    /// ignored when the id exists, updates and deletes when it does not.
    async fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt>;
}

/// Reads of the sensor snapshot table.
#[async_trait]
pub trait SensorSnapshotStore: Send + Sync {
    /// Loads one sensor snapshot.
    async fn get_sensor(&self, id: SensorId, liveness: Liveness) -> Result<Option<SensorSnapshot>>;

    /// Loads every snapshot among `ids` that passes `liveness`.
    ///
    /// Missing ids are skipped. Order is unspecified.
    async fn get_sensors(
        &self,
        ids: &[SensorId],
        liveness: Liveness,
    ) -> Result<Vec<SensorSnapshot>>;

    /// Checks whether a sensor snapshot exists.
    async fn sensor_exists(&self, id: SensorId, liveness: Liveness) -> Result<bool> {
        Ok(self.get_sensor(id, liveness).await?.is_some())
    }
}

/// Reads of the owner snapshot table.
#[async_trait]
pub trait OwnerSnapshotStore: Send + Sync {
    /// Loads one owner snapshot.
    async fn get_owner(&self, id: OwnerId, liveness: Liveness) -> Result<Option<OwnerSnapshot>>;

    /// Loads every snapshot among `ids` that passes `liveness`.
    async fn get_owners(&self, ids: &[OwnerId], liveness: Liveness) -> Result<Vec<OwnerSnapshot>>;

    /// Checks whether an owner snapshot exists.
    async fn owner_exists(&self, id: OwnerId, liveness: Liveness) -> Result<bool> {
        Ok(self.get_owner(id, liveness).await?.is_some())
    }
}

/// Reads of stored readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Loads one reading.
    async fn get_reading(&self, id: AggregateId) -> Result<Option<ReadingRecord>>;

    /// Returns readings matching a query, ordered by reading time.
    async fn query_readings(&self, query: ReadingQuery) -> Result<Vec<ReadingRecord>>;
}

/// Reads of stored alerts.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Loads an alert at its stored version.
    async fn get_alert(&self, id: AggregateId) -> Result<Option<Root<Alert>>>;

    /// Returns a sensor's alerts, most recently raised first.
    async fn alerts_for_sensor(&self, sensor_id: SensorId) -> Result<Vec<AlertRecord>>;
}

/// Delivery bookkeeping for the outbox.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns up to `limit` entries still to publish, oldest first.
    ///
    /// Entries that already used `max_attempts` attempts are left out.
    async fn fetch_unpublished(&self, limit: usize, max_attempts: u32) -> Result<Vec<OutboxEntry>>;

    /// Records a successful publish.
    async fn mark_published(&self, id: Uuid) -> Result<()>;

    /// Records a failed publish attempt and returns the entry's new status.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<OutboxStatus>;

    /// Deletes entries published more than `retention` ago and returns how
    /// many went.
    ///
    /// An event id is de-duplicated only while its entry is retained.
    async fn prune_published(&self, retention: Duration) -> Result<usize>;
}

/// Everything the ingest service needs from one backend.
pub trait Store:
    UnitOfWork + SensorSnapshotStore + OwnerSnapshotStore + ReadingStore + AlertStore + OutboxStore
{
}

impl<T> Store for T where
    T: UnitOfWork
        + SensorSnapshotStore
        + OwnerSnapshotStore
        + ReadingStore
        + AlertStore
        + OutboxStore
{
}
