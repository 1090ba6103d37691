use chrono::{DateTime, Utc};
use common::SensorId;

/// Builder for reading queries.
///
/// Results are ordered by reading time, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ReadingQuery {
    /// Filter by sensor.
    pub sensor_id: Option<SensorId>,

    /// Readings taken at or after this time.
    pub from: Option<DateTime<Utc>>,

    /// Readings taken at or before this time.
    pub to: Option<DateTime<Utc>>,

    /// Maximum number of readings to return.
    pub limit: Option<usize>,

    /// Number of readings to skip.
    pub offset: Option<usize>,
}

impl ReadingQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one sensor.
    pub fn for_sensor(sensor_id: SensorId) -> Self {
        Self {
            sensor_id: Some(sensor_id),
            ..Default::default()
        }
    }

    /// Restricts to readings taken within `from..=to`.
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Restricts to readings taken at or after `from`.
    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips a number of results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if a reading from `sensor_id` taken at `time` matches.
    pub fn matches(&self, sensor_id: SensorId, time: DateTime<Utc>) -> bool {
        if let Some(id) = self.sensor_id
            && id != sensor_id
        {
            return false;
        }
        if let Some(from) = self.from
            && time < from
        {
            return false;
        }
        if let Some(to) = self.to
            && time > to
        {
            return false;
        }
        true
    }
}
