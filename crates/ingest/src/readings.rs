//! Reading ingest with the active-sensor guard.

use std::collections::HashSet;
use std::sync::Arc;

use common::{AggregateId, SensorId};
use domain::{Aggregate, Alert, AlertRules, NewReading, ReadingRecord, Root, SensorReading};
use serde::Serialize;
use store::{
    ChangeSet, Liveness, ReadingQuery, ReadingStore, SensorSnapshotStore, Store, UnitOfWork,
};

use crate::mapping::{stage_alert_events, stage_reading_events};
use crate::{IngestError, OperationContext, Result};

const INGEST_SOURCE: &str = "IngestReading";
const BATCH_SOURCE: &str = "IngestReadingBatch";

/// A reading that was stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestedReading {
    pub reading_id: AggregateId,
    pub sensor_id: SensorId,
    /// Integration events staged for this reading, alerts included.
    pub events_staged: usize,
    pub alerts_raised: usize,
}

/// One rejected entry of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    /// Position of the entry in the submitted batch.
    pub index: usize,
    pub sensor_id: SensorId,
    pub reason: &'static str,
    pub message: String,
}

/// Outcome of a batch ingest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchIngestResult {
    pub processed_count: usize,
    pub failed_count: usize,
    pub reading_ids: Vec<AggregateId>,
    pub failures: Vec<BatchFailure>,
}

/// Accepts readings from sensors with an active snapshot.
///
/// Each accepted reading is stored together with its `SensorIngested`
/// integration event, plus any alerts the configured rules raise.
pub struct ReadingIngestService<S> {
    store: Arc<S>,
    alert_rules: Option<AlertRules>,
}

impl<S: Store> ReadingIngestService<S> {
    /// Creates a service that stores readings only.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            alert_rules: None,
        }
    }

    /// Raises alerts for readings crossing `rules`, in the reading's commit.
    pub fn with_alert_rules(mut self, rules: AlertRules) -> Self {
        self.alert_rules = Some(rules);
        self
    }

    /// Stores one reading.
    ///
    /// Fails with [`IngestError::SensorNotFound`] unless the sensor has an
    /// active snapshot; nothing is written in that case.
    #[tracing::instrument(skip(self, input, ctx), fields(sensor_id = %input.sensor_id, correlation_id = %ctx.correlation_id))]
    pub async fn ingest(&self, input: NewReading, ctx: &OperationContext) -> Result<IngestedReading> {
        let sensor_id = input.sensor_id;
        let reading = SensorReading::create(input).inspect_err(|_| reject("validation"))?;

        if !self.store.sensor_exists(sensor_id, Liveness::ActiveOnly).await? {
            reject("sensor_not_found");
            tracing::info!("reading rejected, no active sensor snapshot");
            return Err(IngestError::SensorNotFound(sensor_id));
        }

        let mut changes = ChangeSet::new();
        let ingested = self.stage(&mut changes, reading, ctx, INGEST_SOURCE)?;
        self.store.commit(changes).await?;

        metrics::counter!("ingest_readings_accepted_total").increment(1);
        tracing::debug!(reading_id = %ingested.reading_id, alerts = ingested.alerts_raised, "reading stored");
        Ok(ingested)
    }

    /// Stores every acceptable reading of a batch in one commit.
    ///
    /// Entries that fail validation or name a sensor without an active
    /// snapshot are reported in the result and skipped. If the commit fails
    /// no entry is stored and the error is returned.
    #[tracing::instrument(skip(self, inputs, ctx), fields(batch_size = inputs.len(), correlation_id = %ctx.correlation_id))]
    pub async fn ingest_batch(
        &self,
        inputs: Vec<NewReading>,
        ctx: &OperationContext,
    ) -> Result<BatchIngestResult> {
        let mut requested: Vec<SensorId> = inputs.iter().map(|i| i.sensor_id).collect();
        requested.sort();
        requested.dedup();
        let active: HashSet<SensorId> = self
            .store
            .get_sensors(&requested, Liveness::ActiveOnly)
            .await?
            .into_iter()
            .map(|snapshot| snapshot.id)
            .collect();

        let mut result = BatchIngestResult::default();
        let mut changes = ChangeSet::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let sensor_id = input.sensor_id;
            let staged = match SensorReading::create(input) {
                Err(errors) => Err(IngestError::Validation(errors)),
                Ok(_) if !active.contains(&sensor_id) => Err(IngestError::SensorNotFound(sensor_id)),
                Ok(reading) => self.stage(&mut changes, reading, ctx, BATCH_SOURCE),
            };

            match staged {
                Ok(ingested) => result.reading_ids.push(ingested.reading_id),
                Err(e) if e.is_rejection() => {
                    reject(e.reason());
                    result.failures.push(BatchFailure {
                        index,
                        sensor_id,
                        reason: e.reason(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        result.processed_count = result.reading_ids.len();
        result.failed_count = result.failures.len();

        if !changes.is_empty() {
            self.store.commit(changes).await?;
            metrics::counter!("ingest_readings_accepted_total")
                .increment(result.processed_count as u64);
        }

        tracing::info!(
            processed = result.processed_count,
            failed = result.failed_count,
            "batch ingested"
        );
        Ok(result)
    }

    /// Returns stored readings matching `query`.
    pub async fn readings(&self, query: ReadingQuery) -> Result<Vec<ReadingRecord>> {
        Ok(self.store.query_readings(query).await?)
    }

    fn stage(
        &self,
        changes: &mut ChangeSet,
        reading: Root<SensorReading>,
        ctx: &OperationContext,
        source: &str,
    ) -> Result<IngestedReading> {
        let (Some(reading_id), Some(sensor_id)) = (reading.id(), reading.sensor_id()) else {
            return Err(store::StoreError::Uninitialized("SensorReading").into());
        };

        // Raise before staging so a rejected alert leaves `changes` untouched
        let alerts = match &self.alert_rules {
            Some(rules) => rules
                .evaluate(&reading)
                .into_iter()
                .map(Alert::raise)
                .collect::<std::result::Result<Vec<Root<Alert>>, _>>()?,
            None => Vec::new(),
        };

        changes.add_reading(&reading)?;
        let mut events_staged = stage_reading_events(changes, &reading, ctx, source)?;
        for alert in &alerts {
            changes.save_alert(alert)?;
            events_staged += stage_alert_events(changes, alert, ctx, source)?;
        }

        Ok(IngestedReading {
            reading_id,
            sensor_id,
            events_staged,
            alerts_raised: alerts.len(),
        })
    }
}

fn reject(reason: &'static str) {
    metrics::counter!("ingest_readings_rejected_total", "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use common::{OwnerId, PlotId, PropertyId};
    use domain::{OperationalStatus, ReadingMetrics, SensorDetails, SensorSnapshot};
    use store::{AlertStore, InMemoryStore};

    async fn store_with_sensor(status: OperationalStatus) -> (Arc<InMemoryStore>, SensorId) {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let snapshot = SensorSnapshot::register(
            SensorId::new(),
            SensorDetails {
                owner_id: OwnerId::new(),
                property_id: PropertyId::new(),
                plot_id: PlotId::new(),
                label: None,
                plot_name: "Greenhouse 2".to_string(),
                property_name: "Horta Norte".to_string(),
            },
            status,
            now,
            now,
        );
        let id = snapshot.id;
        let mut changes = ChangeSet::new();
        changes.add_sensor(snapshot);
        store.commit(changes).await.unwrap();
        (store, id)
    }

    fn input(sensor_id: SensorId, temperature: f64) -> NewReading {
        NewReading {
            sensor_id,
            time: Utc::now() - Duration::seconds(30),
            metrics: ReadingMetrics {
                temperature: Some(temperature),
                humidity: Some(55.0),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn active_sensor_reading_is_stored_with_its_event() {
        let (store, sensor_id) = store_with_sensor(OperationalStatus::Active).await;
        let service = ReadingIngestService::new(Arc::clone(&store));

        let ingested = service
            .ingest(input(sensor_id, 22.0), &OperationContext::new())
            .await
            .unwrap();

        assert_eq!(ingested.events_staged, 1);
        assert!(store.get_reading(ingested.reading_id).await.unwrap().is_some());
        let outbox = store.outbox_entries().await;
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].envelope.event_type, "SensorIngested");
    }

    #[tokio::test]
    async fn inactive_sensor_is_not_found() {
        let (store, sensor_id) = store_with_sensor(OperationalStatus::Maintenance).await;
        let service = ReadingIngestService::new(Arc::clone(&store));
        let commits = store.commit_count();

        let err = service
            .ingest(input(sensor_id, 22.0), &OperationContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::SensorNotFound(id) if id == sensor_id));
        assert_eq!(store.reading_count().await, 0);
        assert_eq!(store.commit_count(), commits);
    }

    #[tokio::test]
    async fn invalid_reading_is_rejected_before_the_guard() {
        let (store, sensor_id) = store_with_sensor(OperationalStatus::Active).await;
        let service = ReadingIngestService::new(Arc::clone(&store));
        let mut bad = input(sensor_id, 120.0);
        bad.time = Utc::now() + Duration::hours(1);

        let err = service.ingest(bad, &OperationContext::new()).await.unwrap_err();

        let IngestError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.len(), 2);
        assert!(store.outbox_entries().await.is_empty());
    }

    #[tokio::test]
    async fn failed_commit_stages_nothing() {
        let (store, sensor_id) = store_with_sensor(OperationalStatus::Active).await;
        let service = ReadingIngestService::new(Arc::clone(&store));
        store.fail_next_commit();

        let err = service
            .ingest(input(sensor_id, 22.0), &OperationContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Store(_)));
        assert_eq!(store.reading_count().await, 0);
        assert!(store.outbox_entries().await.is_empty());
    }

    #[tokio::test]
    async fn alert_rules_raise_in_the_same_commit() {
        let (store, sensor_id) = store_with_sensor(OperationalStatus::Active).await;
        let service =
            ReadingIngestService::new(Arc::clone(&store)).with_alert_rules(AlertRules::default());
        let commits = store.commit_count();

        let ingested = service
            .ingest(input(sensor_id, 44.5), &OperationContext::new())
            .await
            .unwrap();

        assert_eq!(ingested.alerts_raised, 1);
        assert_eq!(ingested.events_staged, 2);
        assert_eq!(store.commit_count(), commits + 1);
        assert_eq!(store.alerts_for_sensor(sensor_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn batch_mixes_accepted_and_unknown_sensors() {
        let (store, active) = store_with_sensor(OperationalStatus::Active).await;
        let service = ReadingIngestService::new(Arc::clone(&store));
        let ctx = OperationContext::new();

        let result = service
            .ingest_batch(
                vec![
                    input(active, 20.0),
                    input(SensorId::new(), 20.0),
                    input(SensorId::new(), 20.0),
                ],
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(result.processed_count, 1);
        assert_eq!(result.failed_count, 2);
        assert_eq!(result.failures[0].index, 1);
        assert_eq!(result.failures[1].reason, "sensor_not_found");

        let outbox = store.outbox_entries().await;
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].envelope.correlation_id, ctx.correlation_id);
        assert_eq!(outbox[0].envelope.source, "IngestReadingBatch");
    }

    #[tokio::test]
    async fn batch_commit_failure_stores_nothing() {
        let (store, active) = store_with_sensor(OperationalStatus::Active).await;
        let service = ReadingIngestService::new(Arc::clone(&store));
        store.fail_next_commit();

        let result = service
            .ingest_batch(
                vec![input(active, 20.0), input(active, 21.0)],
                &OperationContext::new(),
            )
            .await;

        assert!(matches!(result, Err(IngestError::Store(_))));
        assert_eq!(store.reading_count().await, 0);
        assert!(store.outbox_entries().await.is_empty());
    }

    #[tokio::test]
    async fn batch_with_nothing_acceptable_skips_commit() {
        let (store, _) = store_with_sensor(OperationalStatus::Active).await;
        let service = ReadingIngestService::new(Arc::clone(&store));
        let commits = store.commit_count();

        let result = service
            .ingest_batch(vec![input(SensorId::new(), 20.0)], &OperationContext::new())
            .await
            .unwrap();

        assert_eq!(result.processed_count, 0);
        assert_eq!(store.commit_count(), commits);
    }

    #[tokio::test]
    async fn readings_query_by_window() {
        let (store, sensor_id) = store_with_sensor(OperationalStatus::Active).await;
        let service = ReadingIngestService::new(Arc::clone(&store));
        let now: DateTime<Utc> = Utc::now();

        for minutes in [90, 30, 10] {
            let mut reading = input(sensor_id, 18.0);
            reading.time = now - Duration::minutes(minutes);
            service.ingest(reading, &OperationContext::new()).await.unwrap();
        }

        let recent = service
            .readings(ReadingQuery::for_sensor(sensor_id).since(now - Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
    }
}
