//! Sensor reading domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, SensorId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::ReadingMetrics;

/// Events that can occur on a sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ReadingEvent {
    /// A reading was accepted.
    Recorded(ReadingRecordedData),
}

impl DomainEvent for ReadingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReadingEvent::Recorded(_) => "ReadingRecorded",
        }
    }

    fn occurred_on(&self) -> DateTime<Utc> {
        match self {
            ReadingEvent::Recorded(data) => data.recorded_at,
        }
    }
}

/// Data for the ReadingRecorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecordedData {
    /// The new reading's ID.
    pub reading_id: AggregateId,

    /// The sensor that produced the sample.
    pub sensor_id: SensorId,

    /// When the sample was taken, as reported by the device.
    pub time: DateTime<Utc>,

    /// The sampled values.
    pub metrics: ReadingMetrics,

    /// When the reading was accepted.
    pub recorded_at: DateTime<Utc>,
}
