//! SensorReading aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, SensorId};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Root, Version};
use crate::validation::ValidationErrors;

use super::{ReadingEvent, ReadingMetrics, ReadingRecordedData};

/// How far ahead of the server clock a device timestamp may be.
pub const MAX_FUTURE_SKEW_SECS: i64 = 5 * 60;

/// Input for recording a new reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub sensor_id: SensorId,
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: ReadingMetrics,
}

/// One sample of sensor metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    id: Option<AggregateId>,
    sensor_id: Option<SensorId>,
    time: Option<DateTime<Utc>>,
    metrics: ReadingMetrics,
    recorded_at: Option<DateTime<Utc>>,
}

impl Aggregate for SensorReading {
    type Event = ReadingEvent;

    fn aggregate_type() -> &'static str {
        "SensorReading"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReadingEvent::Recorded(data) => {
                self.id = Some(data.reading_id);
                self.sensor_id = Some(data.sensor_id);
                self.time = Some(data.time);
                self.metrics = data.metrics;
                self.recorded_at = Some(data.recorded_at);
            }
        }
    }
}

impl SensorReading {
    /// Validates `input` against the current clock and records it.
    pub fn create(input: NewReading) -> Result<Root<SensorReading>, ValidationErrors> {
        Self::create_at(input, Utc::now())
    }

    /// Validates `input` as of `now` and records it.
    ///
    /// Every failed check is reported, not just the first.
    pub fn create_at(
        input: NewReading,
        now: DateTime<Utc>,
    ) -> Result<Root<SensorReading>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(input.sensor_id.is_nil(), "sensor_id", "must not be empty");
        errors.check(
            input.time > now + Duration::seconds(MAX_FUTURE_SKEW_SECS),
            "time",
            "must not be more than 5 minutes in the future",
        );
        input.metrics.validate(&mut errors);

        errors.into_result(|| {
            let mut root: Root<SensorReading> = Root::new();
            root.record(ReadingEvent::Recorded(ReadingRecordedData {
                reading_id: AggregateId::new(),
                sensor_id: input.sensor_id,
                time: input.time,
                metrics: input.metrics,
                recorded_at: now,
            }));
            root
        })
    }

    /// Rebuilds a persisted reading by replaying its creation event.
    pub fn restore(record: ReadingRecord) -> Root<SensorReading> {
        let mut state = SensorReading::default();
        state.apply(&ReadingEvent::Recorded(ReadingRecordedData {
            reading_id: record.id,
            sensor_id: record.sensor_id,
            time: record.time,
            metrics: record.metrics,
            recorded_at: record.recorded_at,
        }));
        Root::rehydrate(state, Version::new(1))
    }

    /// Returns the sensor that produced this reading.
    pub fn sensor_id(&self) -> Option<SensorId> {
        self.sensor_id
    }

    /// Returns the device timestamp.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    /// Returns the sampled values.
    pub fn metrics(&self) -> &ReadingMetrics {
        &self.metrics
    }

    /// Returns when the reading was accepted.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.recorded_at
    }

    /// Flattens a recorded reading into its storage form.
    ///
    /// Returns None for a reading whose creation event was never applied.
    pub fn to_record(&self) -> Option<ReadingRecord> {
        Some(ReadingRecord {
            id: self.id?,
            sensor_id: self.sensor_id?,
            time: self.time?,
            metrics: self.metrics,
            recorded_at: self.recorded_at?,
        })
    }
}

/// Storage form of a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub id: AggregateId,
    pub sensor_id: SensorId,
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub metrics: ReadingMetrics,
    pub recorded_at: DateTime<Utc>,
}
