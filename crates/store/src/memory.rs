use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, EventId, OwnerId, SensorId};
use domain::{Alert, AlertRecord, OwnerSnapshot, ReadingRecord, Root, SensorSnapshot, Version};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::outbox::retention_cutoff;

use crate::{
    AlertStore, ChangeSet, CommitReceipt, Liveness, OutboxEntry, OutboxStatus, OutboxStore,
    OwnerSnapshotStore, ReadingQuery, ReadingStore, Result, SensorSnapshotStore, SnapshotWrite,
    StoreError, UnitOfWork,
};

#[derive(Default)]
struct Tables {
    readings: HashMap<AggregateId, ReadingRecord>,
    alerts: HashMap<AggregateId, (AlertRecord, Version)>,
    sensors: HashMap<SensorId, SensorSnapshot>,
    owners: HashMap<OwnerId, OwnerSnapshot>,
    outbox: Vec<OutboxEntry>,
    outbox_event_ids: HashSet<EventId>,
}

/// In-memory store implementation for testing and single-process runs.
///
/// All tables sit behind one lock, so a commit is atomic with respect to
/// every reader.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    commits: Arc<AtomicUsize>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail with [`StoreError::Unavailable`] without
    /// writing anything.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns the number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Returns the total number of readings stored.
    pub async fn reading_count(&self) -> usize {
        self.tables.read().await.readings.len()
    }

    /// Returns every retained outbox entry in staging order, published ones
    /// included.
    pub async fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.tables.read().await.outbox.clone()
    }

    /// Clears all tables and counters.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
        self.commits.store(0, Ordering::SeqCst);
        self.fail_next_commit.store(false, Ordering::SeqCst);
    }
}

fn apply_snapshot_writes<S, Id>(
    table: &mut HashMap<Id, S>,
    writes: Vec<SnapshotWrite<S, Id>>,
    key: impl Fn(&S) -> Id,
    deactivate: impl Fn(&mut S, DateTime<Utc>, DateTime<Utc>) -> bool,
) -> usize
where
    Id: std::hash::Hash + Eq,
{
    let mut applied = 0;
    for write in writes {
        match write {
            SnapshotWrite::Add(snapshot) => {
                table.entry(key(&snapshot)).or_insert_with(|| {
                    applied += 1;
                    snapshot
                });
            }
            SnapshotWrite::Update(snapshot) => {
                if let Some(existing) = table.get_mut(&key(&snapshot)) {
                    *existing = snapshot;
                    applied += 1;
                }
            }
            SnapshotWrite::Delete { id, occurred_on, at } => {
                if let Some(existing) = table.get_mut(&id)
                    && deactivate(existing, occurred_on, at)
                {
                    applied += 1;
                }
            }
        }
    }
    applied
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        let mut tables = self.tables.write().await;

        // Check every version before writing anything
        for write in &changes.alerts {
            let actual = tables
                .alerts
                .get(&write.record.id)
                .map(|(_, version)| *version)
                .unwrap_or(Version::initial());
            if actual != write.expected_version {
                return Err(StoreError::ConcurrencyConflict {
                    aggregate_id: write.record.id,
                    expected: write.expected_version,
                    actual,
                });
            }
        }

        let mut writes = 0;
        for record in changes.readings {
            if !tables.readings.contains_key(&record.id) {
                tables.readings.insert(record.id, record);
                writes += 1;
            }
        }
        for write in changes.alerts {
            tables
                .alerts
                .insert(write.record.id, (write.record, write.new_version));
            writes += 1;
        }
        writes += apply_snapshot_writes(
            &mut tables.sensors,
            changes.sensors,
            |s| s.id,
            |s, occurred_on, at| s.deactivate(None, occurred_on, at),
        );
        writes += apply_snapshot_writes(
            &mut tables.owners,
            changes.owners,
            |o| o.id,
            OwnerSnapshot::deactivate,
        );

        let mut outbox_entries = 0;
        for entry in changes.outbox {
            if tables.outbox_event_ids.insert(entry.envelope.event_id) {
                tables.outbox.push(entry);
                outbox_entries += 1;
            }
        }

        drop(tables);
        self.commits.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("outbox_events_staged_total").increment(outbox_entries as u64);
        tracing::debug!(writes, outbox_entries, "commit applied");

        Ok(CommitReceipt {
            writes,
            outbox_entries,
        })
    }
}

#[async_trait]
impl SensorSnapshotStore for InMemoryStore {
    async fn get_sensor(&self, id: SensorId, liveness: Liveness) -> Result<Option<SensorSnapshot>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sensors
            .get(&id)
            .filter(|s| liveness.admits(s.is_active))
            .cloned())
    }

    async fn get_sensors(
        &self,
        ids: &[SensorId],
        liveness: Liveness,
    ) -> Result<Vec<SensorSnapshot>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.sensors.get(id))
            .filter(|s| liveness.admits(s.is_active))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OwnerSnapshotStore for InMemoryStore {
    async fn get_owner(&self, id: OwnerId, liveness: Liveness) -> Result<Option<OwnerSnapshot>> {
        let tables = self.tables.read().await;
        Ok(tables
            .owners
            .get(&id)
            .filter(|o| liveness.admits(o.is_active))
            .cloned())
    }

    async fn get_owners(&self, ids: &[OwnerId], liveness: Liveness) -> Result<Vec<OwnerSnapshot>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.owners.get(id))
            .filter(|o| liveness.admits(o.is_active))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReadingStore for InMemoryStore {
    async fn get_reading(&self, id: AggregateId) -> Result<Option<ReadingRecord>> {
        Ok(self.tables.read().await.readings.get(&id).cloned())
    }

    async fn query_readings(&self, query: ReadingQuery) -> Result<Vec<ReadingRecord>> {
        let tables = self.tables.read().await;
        let mut readings: Vec<_> = tables
            .readings
            .values()
            .filter(|r| query.matches(r.sensor_id, r.time))
            .cloned()
            .collect();

        readings.sort_by(|a, b| a.time.cmp(&b.time).then(a.recorded_at.cmp(&b.recorded_at)));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(readings.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl AlertStore for InMemoryStore {
    async fn get_alert(&self, id: AggregateId) -> Result<Option<Root<Alert>>> {
        let tables = self.tables.read().await;
        Ok(tables
            .alerts
            .get(&id)
            .map(|(record, version)| Alert::restore(record.clone(), *version)))
    }

    async fn alerts_for_sensor(&self, sensor_id: SensorId) -> Result<Vec<AlertRecord>> {
        let tables = self.tables.read().await;
        let mut alerts: Vec<_> = tables
            .alerts
            .values()
            .map(|(record, _)| record)
            .filter(|r| r.sensor_id == sensor_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.raised_at.cmp(&a.raised_at));
        Ok(alerts)
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn fetch_unpublished(&self, limit: usize, max_attempts: u32) -> Result<Vec<OutboxEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<_> = tables
            .outbox
            .iter()
            .filter(|e| e.is_deliverable(max_attempts))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn mark_published(&self, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .outbox
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::OutboxEntryNotFound(id))?;
        entry.mark_published(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<OutboxStatus> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .outbox
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::OutboxEntryNotFound(id))?;
        entry.mark_failed(error, Utc::now());
        Ok(entry.status)
    }

    async fn prune_published(&self, retention: std::time::Duration) -> Result<usize> {
        let Some(cutoff) = retention_cutoff(retention, Utc::now()) else {
            return Ok(0);
        };
        let mut tables = self.tables.write().await;
        let Tables {
            outbox,
            outbox_event_ids,
            ..
        } = &mut *tables;
        let before = outbox.len();
        outbox.retain(|entry| {
            let expired = entry.published_before(cutoff);
            if expired {
                outbox_event_ids.remove(&entry.envelope.event_id);
            }
            !expired
        });
        Ok(before - outbox.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::Aggregate;
    use common::{CorrelationId, PlotId, PropertyId};
    use contracts::EventEnvelope;
    use domain::{
        AlertKind, AlertSeverity, NewAlert, NewReading, OperationalStatus, ReadingMetrics,
        SensorDetails, SensorReading,
    };

    fn sensor(status: OperationalStatus) -> SensorSnapshot {
        let now = Utc::now();
        SensorSnapshot::register(
            SensorId::new(),
            SensorDetails {
                owner_id: OwnerId::new(),
                property_id: PropertyId::new(),
                plot_id: PlotId::new(),
                label: None,
                plot_name: "Plot 7".to_string(),
                property_name: "Estância".to_string(),
            },
            status,
            now,
            now,
        )
    }

    fn envelope() -> EventEnvelope {
        EventEnvelope::builder()
            .event_type("SensorIngested")
            .aggregate_id(AggregateId::new())
            .correlation_id(CorrelationId::new())
            .source("IngestReading")
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    fn reading(sensor_id: SensorId, minutes_ago: i64) -> Root<SensorReading> {
        SensorReading::create(NewReading {
            sensor_id,
            time: Utc::now() - Duration::minutes(minutes_ago),
            metrics: ReadingMetrics {
                temperature: Some(18.0),
                ..Default::default()
            },
        })
        .unwrap()
    }

    #[tokio::test]
    async fn commit_applies_all_writes_together() {
        let store = InMemoryStore::new();
        let snapshot = sensor(OperationalStatus::Active);
        let reading = reading(snapshot.id, 0);

        let mut changes = ChangeSet::new();
        changes.add_sensor(snapshot.clone());
        changes.add_reading(&reading).unwrap();
        changes.enqueue(envelope());

        let receipt = store.commit(changes).await.unwrap();

        assert_eq!(receipt.writes, 2);
        assert_eq!(receipt.outbox_entries, 1);
        assert_eq!(store.commit_count(), 1);
        assert!(
            store
                .sensor_exists(snapshot.id, Liveness::ActiveOnly)
                .await
                .unwrap()
        );
        assert_eq!(store.reading_count().await, 1);
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing() {
        let store = InMemoryStore::new();
        let mut changes = ChangeSet::new();
        changes.add_sensor(sensor(OperationalStatus::Active));
        changes.enqueue(envelope());

        store.fail_next_commit();
        let result = store.commit(changes).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.commit_count(), 0);
        assert!(store.outbox_entries().await.is_empty());
    }

    #[tokio::test]
    async fn add_ignores_existing_and_update_ignores_missing() {
        let store = InMemoryStore::new();
        let original = sensor(OperationalStatus::Active);
        let mut changes = ChangeSet::new();
        changes.add_sensor(original.clone());
        store.commit(changes).await.unwrap();

        let mut renamed = original.clone();
        renamed.plot_name = "Renamed".to_string();
        let mut changes = ChangeSet::new();
        changes.add_sensor(renamed);
        changes.update_sensor(sensor(OperationalStatus::Active));
        let receipt = store.commit(changes).await.unwrap();

        assert_eq!(receipt.writes, 0);
        let stored = store
            .get_sensor(original.id, Liveness::ActiveOnly)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.plot_name, "Plot 7");
    }

    #[tokio::test]
    async fn soft_delete_hides_from_active_reads_only() {
        let store = InMemoryStore::new();
        let snapshot = sensor(OperationalStatus::Active);
        let mut changes = ChangeSet::new();
        changes.add_sensor(snapshot.clone());
        store.commit(changes).await.unwrap();

        let deleted_at = Utc::now();
        let mut changes = ChangeSet::new();
        changes.delete_sensor(snapshot.id, deleted_at, deleted_at);
        store.commit(changes).await.unwrap();

        assert!(
            store
                .get_sensor(snapshot.id, Liveness::ActiveOnly)
                .await
                .unwrap()
                .is_none()
        );
        let stored = store
            .get_sensor(snapshot.id, Liveness::IncludeInactive)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.status, OperationalStatus::Inactive);
        assert_eq!(stored.last_status_change_at, Some(deleted_at));
        assert_eq!(stored.updated_at, Some(deleted_at));
    }

    #[tokio::test]
    async fn deleting_an_inactive_snapshot_keeps_its_timestamp() {
        let store = InMemoryStore::new();
        let snapshot = sensor(OperationalStatus::Active);
        let first = Utc::now();
        let mut changes = ChangeSet::new();
        changes.add_sensor(snapshot.clone());
        changes.delete_sensor(snapshot.id, first, first);
        store.commit(changes).await.unwrap();

        let mut changes = ChangeSet::new();
        let later = first + Duration::minutes(5);
        changes.delete_sensor(snapshot.id, later, later);
        let receipt = store.commit(changes).await.unwrap();

        assert_eq!(receipt.writes, 0);
        let stored = store
            .get_sensor(snapshot.id, Liveness::IncludeInactive)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.updated_at, Some(first));
    }

    #[tokio::test]
    async fn get_sensors_respects_liveness() {
        let store = InMemoryStore::new();
        let active = sensor(OperationalStatus::Active);
        let faulty = sensor(OperationalStatus::Faulty);
        let mut changes = ChangeSet::new();
        changes.add_sensor(active.clone());
        changes.add_sensor(faulty.clone());
        store.commit(changes).await.unwrap();

        let ids = [active.id, faulty.id, SensorId::new()];
        let live = store.get_sensors(&ids, Liveness::ActiveOnly).await.unwrap();
        let all = store
            .get_sensors(&ids, Liveness::IncludeInactive)
            .await
            .unwrap();

        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, active.id);
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn stale_alert_save_is_a_conflict() {
        let store = InMemoryStore::new();
        let mut alert = Alert::raise(NewAlert {
            sensor_id: SensorId::new(),
            kind: AlertKind::HighHumidity,
            severity: AlertSeverity::Low,
            message: "Humidity 95%".to_string(),
            value: Some(95.0),
            threshold: Some(90.0),
        })
        .unwrap();
        let mut changes = ChangeSet::new();
        changes.save_alert(&alert).unwrap();
        store.commit(changes).await.unwrap();
        alert.mark_committed();

        let mut first = store.get_alert(alert.id().unwrap()).await.unwrap().unwrap();
        let mut second = first.clone();
        first.acknowledge(None).unwrap();
        second.resolve(None, None).unwrap();

        let mut changes = ChangeSet::new();
        changes.save_alert(&first).unwrap();
        store.commit(changes).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.save_alert(&second).unwrap();
        let result = store.commit(changes).await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { expected, actual, .. })
                if expected == Version::new(1) && actual == Version::new(2)
        ));
    }

    #[tokio::test]
    async fn query_readings_filters_and_orders_by_time() {
        let store = InMemoryStore::new();
        let sensor_id = SensorId::new();
        let mut changes = ChangeSet::new();
        for minutes_ago in [30, 10, 20, 90] {
            changes.add_reading(&reading(sensor_id, minutes_ago)).unwrap();
        }
        changes.add_reading(&reading(SensorId::new(), 5)).unwrap();
        store.commit(changes).await.unwrap();

        let now = Utc::now();
        let readings = store
            .query_readings(
                ReadingQuery::for_sensor(sensor_id).between(now - Duration::hours(1), now),
            )
            .await
            .unwrap();

        assert_eq!(readings.len(), 3);
        assert!(readings.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[tokio::test]
    async fn outbox_bookkeeping() {
        let store = InMemoryStore::new();
        let mut changes = ChangeSet::new();
        changes.enqueue(envelope());
        changes.enqueue(envelope());
        store.commit(changes).await.unwrap();

        let pending = store.fetch_unpublished(10, 3).await.unwrap();
        assert_eq!(pending.len(), 2);

        store.mark_published(pending[0].id).await.unwrap();
        let status = store.mark_failed(pending[1].id, "timeout").await.unwrap();
        assert_eq!(status, OutboxStatus::Failed);

        let pending = store.fetch_unpublished(10, 3).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);

        assert!(matches!(
            store.mark_published(Uuid::new_v4()).await,
            Err(StoreError::OutboxEntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_event_ids_are_staged_once() {
        let store = InMemoryStore::new();
        let envelope = envelope();
        let mut changes = ChangeSet::new();
        changes.enqueue(envelope.clone());
        store.commit(changes).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.enqueue(envelope);
        let receipt = store.commit(changes).await.unwrap();

        assert_eq!(receipt.outbox_entries, 0);
        assert_eq!(store.outbox_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn prune_drops_only_aged_published_entries() {
        let store = InMemoryStore::new();
        let published = envelope();
        let mut changes = ChangeSet::new();
        changes.enqueue(published.clone());
        changes.enqueue(envelope());
        store.commit(changes).await.unwrap();

        let pending = store.fetch_unpublished(10, 3).await.unwrap();
        store.mark_published(pending[0].id).await.unwrap();

        let hour = std::time::Duration::from_secs(3600);
        assert_eq!(store.prune_published(hour).await.unwrap(), 0);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(store.prune_published(std::time::Duration::ZERO).await.unwrap(), 1);

        let remaining = store.outbox_entries().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].status, OutboxStatus::Pending);

        // A pruned event id is no longer remembered.
        let mut changes = ChangeSet::new();
        changes.enqueue(published);
        assert_eq!(store.commit(changes).await.unwrap().outbox_entries, 1);
    }
}
