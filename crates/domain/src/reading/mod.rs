//! Sensor reading aggregate.
//!
//! A reading is one timestamped sample of up to five metrics from a sensor.
//! It is recorded once and never changes afterwards.

mod aggregate;
mod events;
mod value_objects;

pub use aggregate::{MAX_FUTURE_SKEW_SECS, NewReading, ReadingRecord, SensorReading};
pub use events::{ReadingEvent, ReadingRecordedData};
pub use value_objects::ReadingMetrics;
