//! Reading value objects.

use serde::{Deserialize, Serialize};

use crate::validation::{ValidationErrors, check_range};

/// Metric values carried by one reading. Every metric is optional, but a
/// reading must carry at least one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingMetrics {
    /// Air temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity in percent.
    pub humidity: Option<f64>,
    /// Volumetric soil moisture in percent.
    pub soil_moisture: Option<f64>,
    /// Rainfall in millimetres.
    pub rainfall: Option<f64>,
    /// Battery charge in percent.
    pub battery_level: Option<f64>,
}

impl ReadingMetrics {
    pub const TEMPERATURE_RANGE: (f64, f64) = (-50.0, 70.0);
    pub const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);
    pub const SOIL_MOISTURE_RANGE: (f64, f64) = (0.0, 100.0);
    pub const RAINFALL_RANGE: (f64, f64) = (0.0, 1000.0);
    pub const BATTERY_LEVEL_RANGE: (f64, f64) = (0.0, 100.0);

    /// Returns true if no metric is present.
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.humidity.is_none()
            && self.soil_moisture.is_none()
            && self.rainfall.is_none()
            && self.battery_level.is_none()
    }

    /// Returns the number of metrics present.
    pub fn count(&self) -> usize {
        [
            self.temperature,
            self.humidity,
            self.soil_moisture,
            self.rainfall,
            self.battery_level,
        ]
        .iter()
        .filter(|m| m.is_some())
        .count()
    }

    pub(crate) fn validate(&self, errors: &mut ValidationErrors) {
        if self.is_empty() {
            errors.push("metrics", "at least one metric is required");
            return;
        }

        let (min, max) = Self::TEMPERATURE_RANGE;
        check_range(errors, "temperature", self.temperature, min, max);
        let (min, max) = Self::HUMIDITY_RANGE;
        check_range(errors, "humidity", self.humidity, min, max);
        let (min, max) = Self::SOIL_MOISTURE_RANGE;
        check_range(errors, "soil_moisture", self.soil_moisture, min, max);
        let (min, max) = Self::RAINFALL_RANGE;
        check_range(errors, "rainfall", self.rainfall, min, max);
        let (min, max) = Self::BATTERY_LEVEL_RANGE;
        check_range(errors, "battery_level", self.battery_level, min, max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metrics_are_rejected() {
        let mut errors = ValidationErrors::new();
        ReadingMetrics::default().validate(&mut errors);
        assert!(errors.has_field("metrics"));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let metrics = ReadingMetrics {
            temperature: Some(-50.0),
            humidity: Some(100.0),
            soil_moisture: Some(0.0),
            rainfall: Some(1000.0),
            battery_level: Some(100.0),
        };
        let mut errors = ValidationErrors::new();
        metrics.validate(&mut errors);

        assert!(errors.is_empty(), "{errors}");
        assert_eq!(metrics.count(), 5);
    }

    #[test]
    fn every_out_of_range_metric_is_reported() {
        let metrics = ReadingMetrics {
            temperature: Some(70.1),
            humidity: Some(-1.0),
            soil_moisture: None,
            rainfall: Some(1000.5),
            battery_level: Some(f64::INFINITY),
        };
        let mut errors = ValidationErrors::new();
        metrics.validate(&mut errors);

        assert_eq!(errors.len(), 4);
        assert!(!errors.has_field("soil_moisture"));
    }
}
