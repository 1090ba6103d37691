//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need Docker.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use chrono::{Duration, DurationRound, Utc};
use common::{CorrelationId, OwnerId, PlotId, PropertyId, SensorId};
use contracts::EventEnvelope;
use domain::{
    Aggregate, Alert, AlertKind, AlertSeverity, NewAlert, NewReading, OperationalStatus,
    OwnerDetails, OwnerSnapshot, ReadingMetrics, SensorDetails, SensorReading, SensorSnapshot,
    Version,
};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    AlertStore, ChangeSet, Liveness, OutboxStatus, OutboxStore, OwnerSnapshotStore,
    PostgresStore, ReadingQuery, ReadingStore, SensorSnapshotStore, StoreError, UnitOfWork,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_sensor_ingest_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE sensor_readings, alerts, sensor_snapshots, owner_snapshots, outbox",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

/// Postgres keeps microseconds; trim so round-tripped values compare equal.
fn now() -> chrono::DateTime<Utc> {
    Utc::now().duration_trunc(Duration::microseconds(1)).unwrap()
}

fn sensor(status: OperationalStatus) -> SensorSnapshot {
    let at = now();
    SensorSnapshot::register(
        SensorId::new(),
        SensorDetails {
            owner_id: OwnerId::new(),
            property_id: PropertyId::new(),
            plot_id: PlotId::new(),
            label: Some("Station 12".to_string()),
            plot_name: "Vineyard".to_string(),
            property_name: "Quinta".to_string(),
        },
        status,
        at,
        at,
    )
}

fn envelope() -> EventEnvelope {
    EventEnvelope::builder()
        .event_type("SensorIngested")
        .aggregate_id(common::AggregateId::new())
        .correlation_id(CorrelationId::new())
        .source("IngestReading")
        .payload_raw(serde_json::json!({"k": 1}))
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn sensor_snapshot_lifecycle() {
    let store = get_test_store().await;
    let snapshot = sensor(OperationalStatus::Active);

    let mut changes = ChangeSet::new();
    changes.add_sensor(snapshot.clone());
    store.commit(changes).await.unwrap();

    let loaded = store
        .get_sensor(snapshot.id, Liveness::ActiveOnly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, snapshot);

    let deleted_at = now();
    let mut changes = ChangeSet::new();
    changes.delete_sensor(snapshot.id, deleted_at, deleted_at);
    store.commit(changes).await.unwrap();

    let mut changes = ChangeSet::new();
    let later = deleted_at + Duration::minutes(1);
    changes.delete_sensor(snapshot.id, later, later);
    let receipt = store.commit(changes).await.unwrap();
    assert_eq!(receipt.writes, 0);

    assert!(
        !store
            .sensor_exists(snapshot.id, Liveness::ActiveOnly)
            .await
            .unwrap()
    );
    let inactive = store
        .get_sensor(snapshot.id, Liveness::IncludeInactive)
        .await
        .unwrap()
        .unwrap();
    assert!(!inactive.is_active);
    assert_eq!(inactive.status, OperationalStatus::Inactive);
    assert_eq!(inactive.last_status_change_at, Some(deleted_at));
    assert_eq!(inactive.updated_at, Some(deleted_at));
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn owner_snapshot_update_and_batch_lookup() {
    let store = get_test_store().await;
    let at = now();
    let details = OwnerDetails {
        name: "Ana".to_string(),
        email: "ana@example.com".to_string(),
        role: None,
    };
    let mut owner = OwnerSnapshot::create(OwnerId::new(), details.clone(), at, at);
    let other = OwnerSnapshot::create(OwnerId::new(), details, at, at);

    let mut changes = ChangeSet::new();
    changes.add_owner(owner.clone());
    changes.add_owner(other.clone());
    changes.delete_owner(other.id, at, at);
    store.commit(changes).await.unwrap();

    owner.name = "Ana Souza".to_string();
    owner.updated_at = Some(at);
    let mut changes = ChangeSet::new();
    changes.update_owner(owner.clone());
    store.commit(changes).await.unwrap();

    let active = store
        .get_owners(&[owner.id, other.id], Liveness::ActiveOnly)
        .await
        .unwrap();
    assert_eq!(active, vec![owner]);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn failed_commit_rolls_back_every_write() {
    let store = get_test_store().await;
    let snapshot = sensor(OperationalStatus::Active);
    let alert = Alert::raise(NewAlert {
        sensor_id: snapshot.id,
        kind: AlertKind::Custom,
        severity: AlertSeverity::Low,
        message: "Check fence".to_string(),
        value: None,
        threshold: None,
    })
    .unwrap();

    let mut changes = ChangeSet::new();
    changes.save_alert(&alert).unwrap();
    store.commit(changes).await.unwrap();

    // Same alert saved again from version 0 conflicts
    let mut changes = ChangeSet::new();
    changes.add_sensor(snapshot.clone());
    changes.enqueue(envelope());
    changes.save_alert(&alert).unwrap();
    let result = store.commit(changes).await;

    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { actual, .. }) if actual == Version::new(1)
    ));
    assert!(
        store
            .get_sensor(snapshot.id, Liveness::IncludeInactive)
            .await
            .unwrap()
            .is_none()
    );
    assert!(store.fetch_unpublished(10, 5).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn alert_round_trip() {
    let store = get_test_store().await;
    let mut alert = Alert::raise_at(
        NewAlert {
            sensor_id: SensorId::new(),
            kind: AlertKind::LowSoilMoisture,
            severity: AlertSeverity::Medium,
            message: "Soil moisture 12%".to_string(),
            value: Some(12.0),
            threshold: Some(20.0),
        },
        now(),
    )
    .unwrap();
    alert.acknowledge_at(Some(OwnerId::new()), now()).unwrap();

    let mut changes = ChangeSet::new();
    changes.save_alert(&alert).unwrap();
    store.commit(changes).await.unwrap();

    let loaded = store.get_alert(alert.id().unwrap()).await.unwrap().unwrap();
    assert_eq!(loaded.state(), alert.state());
    assert_eq!(loaded.version(), Version::new(2));

    let listed = store
        .alerts_for_sensor(alert.sensor_id().unwrap())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn readings_query_window() {
    let store = get_test_store().await;
    let sensor_id = SensorId::new();
    let base = now();

    let mut changes = ChangeSet::new();
    for minutes_ago in [50, 40, 30, 120] {
        let reading = SensorReading::create_at(
            NewReading {
                sensor_id,
                time: base - Duration::minutes(minutes_ago),
                metrics: ReadingMetrics {
                    humidity: Some(70.0),
                    ..Default::default()
                },
            },
            base,
        )
        .unwrap();
        changes.add_reading(&reading).unwrap();
    }
    store.commit(changes).await.unwrap();

    let readings = store
        .query_readings(
            ReadingQuery::for_sensor(sensor_id)
                .between(base - Duration::hours(1), base)
                .limit(2),
        )
        .await
        .unwrap();

    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].time, base - Duration::minutes(50));
    let first = store.get_reading(readings[0].id).await.unwrap().unwrap();
    assert_eq!(first, readings[0]);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn outbox_delivery_bookkeeping() {
    let store = get_test_store().await;
    let first = envelope();

    let mut changes = ChangeSet::new();
    changes.enqueue(first.clone());
    changes.enqueue(envelope());
    store.commit(changes).await.unwrap();

    // Re-staging an event id is ignored
    let mut changes = ChangeSet::new();
    changes.enqueue(first.clone());
    assert_eq!(store.commit(changes).await.unwrap().outbox_entries, 0);

    let pending = store.fetch_unpublished(10, 2).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].envelope, first);

    store.mark_published(pending[0].id).await.unwrap();
    assert_eq!(
        store.mark_failed(pending[1].id, "timeout").await.unwrap(),
        OutboxStatus::Failed
    );
    assert_eq!(store.fetch_unpublished(10, 2).await.unwrap().len(), 1);

    store.mark_failed(pending[1].id, "timeout").await.unwrap();
    assert!(store.fetch_unpublished(10, 2).await.unwrap().is_empty());
}
