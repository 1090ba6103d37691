use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, OwnerId, PlotId, PropertyId, SensorId};
use domain::{
    Alert, AlertRecord, OwnerSnapshot, ReadingMetrics, ReadingRecord, Root, SensorSnapshot,
    Version,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::outbox::retention_cutoff;

use crate::{
    AlertStore, AlertWrite, ChangeSet, CommitReceipt, Liveness, OutboxEntry, OutboxStatus,
    OutboxStore, OwnerSnapshotStore, ReadingQuery, ReadingStore, Result, SensorSnapshotStore,
    SnapshotWrite, StoreError, UnitOfWork,
};

const SENSOR_COLUMNS: &str = "id, owner_id, property_id, plot_id, label, plot_name, property_name, status, status_reason, last_status_change_at, is_active, created_at, updated_at";
const OWNER_COLUMNS: &str =
    "id, name, email, role, is_active, created_at, updated_at, last_changed_at";
const READING_COLUMNS: &str = "id, sensor_id, time, temperature, humidity, soil_moisture, rainfall, battery_level, recorded_at";
const ALERT_COLUMNS: &str = "id, sensor_id, kind, severity, message, value, threshold, status, raised_at, acknowledged_at, acknowledged_by, resolved_at, resolved_by, resolution_notes, version";
const OUTBOX_COLUMNS: &str =
    "id, envelope, status, created_at, processed_at, attempts, last_error";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn parse<T: std::str::FromStr>(row: &PgRow, column: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        let raw: String = row.try_get(column)?;
        raw.parse()
            .map_err(|e: T::Err| StoreError::InvalidRecord(format!("{column}: {e}")))
    }

    fn row_to_sensor(row: PgRow) -> Result<SensorSnapshot> {
        Ok(SensorSnapshot {
            id: SensorId::from_uuid(row.try_get("id")?),
            owner_id: OwnerId::from_uuid(row.try_get("owner_id")?),
            property_id: PropertyId::from_uuid(row.try_get("property_id")?),
            plot_id: PlotId::from_uuid(row.try_get("plot_id")?),
            label: row.try_get("label")?,
            plot_name: row.try_get("plot_name")?,
            property_name: row.try_get("property_name")?,
            status: Self::parse(&row, "status")?,
            status_reason: row.try_get("status_reason")?,
            last_status_change_at: row.try_get("last_status_change_at")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_owner(row: PgRow) -> Result<OwnerSnapshot> {
        Ok(OwnerSnapshot {
            id: OwnerId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: row.try_get("role")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            last_changed_at: row.try_get("last_changed_at")?,
        })
    }

    fn row_to_reading(row: PgRow) -> Result<ReadingRecord> {
        Ok(ReadingRecord {
            id: AggregateId::from_uuid(row.try_get("id")?),
            sensor_id: SensorId::from_uuid(row.try_get("sensor_id")?),
            time: row.try_get("time")?,
            metrics: ReadingMetrics {
                temperature: row.try_get("temperature")?,
                humidity: row.try_get("humidity")?,
                soil_moisture: row.try_get("soil_moisture")?,
                rainfall: row.try_get("rainfall")?,
                battery_level: row.try_get("battery_level")?,
            },
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    fn row_to_alert(row: PgRow) -> Result<(AlertRecord, Version)> {
        let record = AlertRecord {
            id: AggregateId::from_uuid(row.try_get("id")?),
            sensor_id: SensorId::from_uuid(row.try_get("sensor_id")?),
            kind: Self::parse(&row, "kind")?,
            severity: Self::parse(&row, "severity")?,
            message: row.try_get("message")?,
            value: row.try_get("value")?,
            threshold: row.try_get("threshold")?,
            status: Self::parse(&row, "status")?,
            raised_at: row.try_get("raised_at")?,
            acknowledged_at: row.try_get("acknowledged_at")?,
            acknowledged_by: row
                .try_get::<Option<Uuid>, _>("acknowledged_by")?
                .map(OwnerId::from_uuid),
            resolved_at: row.try_get("resolved_at")?,
            resolved_by: row
                .try_get::<Option<Uuid>, _>("resolved_by")?
                .map(OwnerId::from_uuid),
            resolution_notes: row.try_get("resolution_notes")?,
        };
        Ok((record, Version::new(row.try_get("version")?)))
    }

    fn row_to_outbox(row: PgRow) -> Result<OutboxEntry> {
        let status: String = row.try_get("status")?;
        let attempts: i32 = row.try_get("attempts")?;
        Ok(OutboxEntry {
            id: row.try_get("id")?,
            envelope: serde_json::from_value(row.try_get("envelope")?)?,
            status: OutboxStatus::parse(&status)
                .ok_or_else(|| StoreError::InvalidRecord(format!("outbox status: {status}")))?,
            created_at: row.try_get("created_at")?,
            processed_at: row.try_get("processed_at")?,
            attempts: attempts.max(0) as u32,
            last_error: row.try_get("last_error")?,
        })
    }

    async fn insert_reading(tx: &mut Transaction<'_, Postgres>, r: &ReadingRecord) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sensor_readings (id, sensor_id, time, temperature, humidity, soil_moisture, rainfall, battery_level, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(r.id.as_uuid())
        .bind(r.sensor_id.as_uuid())
        .bind(r.time)
        .bind(r.metrics.temperature)
        .bind(r.metrics.humidity)
        .bind(r.metrics.soil_moisture)
        .bind(r.metrics.rainfall)
        .bind(r.metrics.battery_level)
        .bind(r.recorded_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn save_alert(tx: &mut Transaction<'_, Postgres>, write: &AlertWrite) -> Result<()> {
        let r = &write.record;
        let sql = if write.expected_version == Version::initial() {
            r#"
            INSERT INTO alerts (id, sensor_id, kind, severity, message, value, threshold, status, raised_at,
                                acknowledged_at, acknowledged_by, resolved_at, resolved_by, resolution_notes, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO NOTHING
            "#
        } else {
            r#"
            UPDATE alerts
            SET sensor_id = $2, kind = $3, severity = $4, message = $5, value = $6, threshold = $7,
                status = $8, raised_at = $9, acknowledged_at = $10, acknowledged_by = $11,
                resolved_at = $12, resolved_by = $13, resolution_notes = $14, version = $15
            WHERE id = $1 AND version = $16
            "#
        };

        let mut query = sqlx::query(sql)
            .bind(r.id.as_uuid())
            .bind(r.sensor_id.as_uuid())
            .bind(r.kind.as_str())
            .bind(r.severity.as_str())
            .bind(&r.message)
            .bind(r.value)
            .bind(r.threshold)
            .bind(r.status.as_str())
            .bind(r.raised_at)
            .bind(r.acknowledged_at)
            .bind(r.acknowledged_by.map(|id| id.as_uuid()))
            .bind(r.resolved_at)
            .bind(r.resolved_by.map(|id| id.as_uuid()))
            .bind(&r.resolution_notes)
            .bind(write.new_version.as_i64());
        if write.expected_version != Version::initial() {
            query = query.bind(write.expected_version.as_i64());
        }
        let result = query.execute(&mut **tx).await?;

        if result.rows_affected() == 0 {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM alerts WHERE id = $1")
                .bind(r.id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;
            return Err(StoreError::ConcurrencyConflict {
                aggregate_id: r.id,
                expected: write.expected_version,
                actual: Version::new(actual.unwrap_or(0)),
            });
        }
        Ok(())
    }

    async fn write_sensor(
        tx: &mut Transaction<'_, Postgres>,
        write: &SnapshotWrite<SensorSnapshot, SensorId>,
    ) -> Result<u64> {
        let query = match write {
            SnapshotWrite::Delete { id, occurred_on, at } => sqlx::query(
                r#"
                UPDATE sensor_snapshots
                SET status = 'Inactive', status_reason = NULL, is_active = FALSE,
                    last_status_change_at = $2, updated_at = $3
                WHERE id = $1 AND (is_active OR status <> 'Inactive')
                "#,
            )
            .bind(id.as_uuid())
            .bind(*occurred_on)
            .bind(*at),
            SnapshotWrite::Add(s) | SnapshotWrite::Update(s) => {
                let sql = if matches!(write, SnapshotWrite::Add(_)) {
                    r#"
                    INSERT INTO sensor_snapshots (id, owner_id, property_id, plot_id, label, plot_name, property_name,
                                                  status, status_reason, last_status_change_at, is_active, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                    ON CONFLICT (id) DO NOTHING
                    "#
                } else {
                    r#"
                    UPDATE sensor_snapshots
                    SET owner_id = $2, property_id = $3, plot_id = $4, label = $5, plot_name = $6,
                        property_name = $7, status = $8, status_reason = $9, last_status_change_at = $10,
                        is_active = $11, created_at = $12, updated_at = $13
                    WHERE id = $1
                    "#
                };
                sqlx::query(sql)
                    .bind(s.id.as_uuid())
                    .bind(s.owner_id.as_uuid())
                    .bind(s.property_id.as_uuid())
                    .bind(s.plot_id.as_uuid())
                    .bind(s.label.clone())
                    .bind(s.plot_name.clone())
                    .bind(s.property_name.clone())
                    .bind(s.status.as_str())
                    .bind(s.status_reason.clone())
                    .bind(s.last_status_change_at)
                    .bind(s.is_active)
                    .bind(s.created_at)
                    .bind(s.updated_at)
            }
        };
        Ok(query.execute(&mut **tx).await?.rows_affected())
    }

    async fn write_owner(
        tx: &mut Transaction<'_, Postgres>,
        write: &SnapshotWrite<OwnerSnapshot, OwnerId>,
    ) -> Result<u64> {
        let query = match write {
            SnapshotWrite::Delete { id, occurred_on, at } => sqlx::query(
                "UPDATE owner_snapshots SET is_active = FALSE, last_changed_at = $2, updated_at = $3 WHERE id = $1 AND is_active",
            )
            .bind(id.as_uuid())
            .bind(*occurred_on)
            .bind(*at),
            SnapshotWrite::Add(o) | SnapshotWrite::Update(o) => {
                let sql = if matches!(write, SnapshotWrite::Add(_)) {
                    r#"
                    INSERT INTO owner_snapshots (id, name, email, role, is_active, created_at, updated_at, last_changed_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (id) DO NOTHING
                    "#
                } else {
                    r#"
                    UPDATE owner_snapshots
                    SET name = $2, email = $3, role = $4, is_active = $5, created_at = $6,
                        updated_at = $7, last_changed_at = $8
                    WHERE id = $1
                    "#
                };
                sqlx::query(sql)
                    .bind(o.id.as_uuid())
                    .bind(o.name.clone())
                    .bind(o.email.clone())
                    .bind(o.role.clone())
                    .bind(o.is_active)
                    .bind(o.created_at)
                    .bind(o.updated_at)
                    .bind(o.last_changed_at)
            }
        };
        Ok(query.execute(&mut **tx).await?.rows_affected())
    }

    async fn insert_outbox(tx: &mut Transaction<'_, Postgres>, entry: &OutboxEntry) -> Result<u64> {
        let envelope = serde_json::to_value(&entry.envelope)?;
        let result = sqlx::query(
            r#"
            INSERT INTO outbox (id, event_id, event_type, envelope, status, created_at, attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(entry.envelope.event_id.as_uuid())
        .bind(&entry.envelope.event_type)
        .bind(envelope)
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .bind(entry.attempts as i32)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UnitOfWork for PostgresStore {
    async fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt> {
        // Dropping the transaction on any early return rolls it back
        let mut tx = self.pool.begin().await?;
        let mut writes = 0u64;

        for reading in &changes.readings {
            writes += Self::insert_reading(&mut tx, reading).await?;
        }
        for alert in &changes.alerts {
            Self::save_alert(&mut tx, alert).await?;
            writes += 1;
        }
        for write in &changes.sensors {
            writes += Self::write_sensor(&mut tx, write).await?;
        }
        for write in &changes.owners {
            writes += Self::write_owner(&mut tx, write).await?;
        }
        let mut outbox_entries = 0u64;
        for entry in &changes.outbox {
            outbox_entries += Self::insert_outbox(&mut tx, entry).await?;
        }

        tx.commit().await?;
        metrics::counter!("outbox_events_staged_total").increment(outbox_entries);
        tracing::debug!(writes, outbox_entries, "commit applied");

        Ok(CommitReceipt {
            writes: writes as usize,
            outbox_entries: outbox_entries as usize,
        })
    }
}

#[async_trait]
impl SensorSnapshotStore for PostgresStore {
    async fn get_sensor(&self, id: SensorId, liveness: Liveness) -> Result<Option<SensorSnapshot>> {
        let sql =
            format!("SELECT {SENSOR_COLUMNS} FROM sensor_snapshots WHERE id = $1 AND ($2 OR is_active)");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(liveness.includes_inactive())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_sensor).transpose()
    }

    async fn get_sensors(
        &self,
        ids: &[SensorId],
        liveness: Liveness,
    ) -> Result<Vec<SensorSnapshot>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let sql = format!(
            "SELECT {SENSOR_COLUMNS} FROM sensor_snapshots WHERE id = ANY($1) AND ($2 OR is_active)"
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .bind(liveness.includes_inactive())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_sensor).collect()
    }
}

#[async_trait]
impl OwnerSnapshotStore for PostgresStore {
    async fn get_owner(&self, id: OwnerId, liveness: Liveness) -> Result<Option<OwnerSnapshot>> {
        let sql =
            format!("SELECT {OWNER_COLUMNS} FROM owner_snapshots WHERE id = $1 AND ($2 OR is_active)");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(liveness.includes_inactive())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_owner).transpose()
    }

    async fn get_owners(&self, ids: &[OwnerId], liveness: Liveness) -> Result<Vec<OwnerSnapshot>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let sql = format!(
            "SELECT {OWNER_COLUMNS} FROM owner_snapshots WHERE id = ANY($1) AND ($2 OR is_active)"
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .bind(liveness.includes_inactive())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_owner).collect()
    }
}

#[async_trait]
impl ReadingStore for PostgresStore {
    async fn get_reading(&self, id: AggregateId) -> Result<Option<ReadingRecord>> {
        let sql = format!("SELECT {READING_COLUMNS} FROM sensor_readings WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_reading).transpose()
    }

    async fn query_readings(&self, query: ReadingQuery) -> Result<Vec<ReadingRecord>> {
        let mut sql = format!("SELECT {READING_COLUMNS} FROM sensor_readings WHERE 1=1");
        let mut param_idx = 1;

        // Build dynamic query
        if query.sensor_id.is_some() {
            sql.push_str(&format!(" AND sensor_id = ${param_idx}"));
            param_idx += 1;
        }
        if query.from.is_some() {
            sql.push_str(&format!(" AND time >= ${param_idx}"));
            param_idx += 1;
        }
        if query.to.is_some() {
            sql.push_str(&format!(" AND time <= ${param_idx}"));
            param_idx += 1;
        }
        sql.push_str(" ORDER BY time ASC, recorded_at ASC");
        if query.limit.is_some() {
            sql.push_str(&format!(" LIMIT ${param_idx}"));
            param_idx += 1;
        }
        if query.offset.is_some() {
            sql.push_str(&format!(" OFFSET ${param_idx}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(id) = query.sensor_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(from) = query.from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(to) = query.to {
            sqlx_query = sqlx_query.bind(to);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_reading).collect()
    }
}

#[async_trait]
impl AlertStore for PostgresStore {
    async fn get_alert(&self, id: AggregateId) -> Result<Option<Root<Alert>>> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| -> Result<Root<Alert>> {
            let (record, version) = Self::row_to_alert(row)?;
            Ok(Alert::restore(record, version))
        })
        .transpose()
    }

    async fn alerts_for_sensor(&self, sensor_id: SensorId) -> Result<Vec<AlertRecord>> {
        let sql = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE sensor_id = $1 ORDER BY raised_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(sensor_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| Self::row_to_alert(row).map(|(record, _)| record))
            .collect()
    }
}

#[async_trait]
impl OutboxStore for PostgresStore {
    async fn fetch_unpublished(&self, limit: usize, max_attempts: u32) -> Result<Vec<OutboxEntry>> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox WHERE status <> 'published' AND attempts < $2 ORDER BY created_at ASC, seq ASC LIMIT $1"
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .bind(max_attempts as i32)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_outbox).collect()
    }

    async fn mark_published(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE outbox SET status = 'published', processed_at = $2, attempts = attempts + 1 WHERE id = $1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::OutboxEntryNotFound(id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<OutboxStatus> {
        let processed_at: DateTime<Utc> = Utc::now();
        let status: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE outbox
            SET status = 'failed', processed_at = $2, attempts = attempts + 1, last_error = $3
            WHERE id = $1
            RETURNING status
            "#,
        )
        .bind(id)
        .bind(processed_at)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        let status = status.ok_or(StoreError::OutboxEntryNotFound(id))?;
        OutboxStatus::parse(&status)
            .ok_or_else(|| StoreError::InvalidRecord(format!("outbox status: {status}")))
    }

    async fn prune_published(&self, retention: std::time::Duration) -> Result<usize> {
        let Some(cutoff) = retention_cutoff(retention, Utc::now()) else {
            return Ok(0);
        };
        let result =
            sqlx::query("DELETE FROM outbox WHERE status = 'published' AND processed_at < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() as usize)
    }
}
