//! Threshold rules that turn readings into alerts.

use serde::{Deserialize, Serialize};

use crate::reading::SensorReading;

use super::{AlertKind, AlertSeverity, NewAlert};

/// Metric thresholds. A reading strictly beyond a threshold raises an alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertRules {
    pub high_temperature: f64,
    pub low_temperature: f64,
    pub low_soil_moisture: f64,
    pub high_humidity: f64,
    pub low_battery: f64,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            high_temperature: 40.0,
            low_temperature: 0.0,
            low_soil_moisture: 20.0,
            high_humidity: 90.0,
            low_battery: 15.0,
        }
    }
}

impl AlertRules {
    /// Returns the alerts `reading` should raise, in a fixed metric order.
    pub fn evaluate(&self, reading: &SensorReading) -> Vec<NewAlert> {
        let Some(sensor_id) = reading.sensor_id() else {
            return Vec::new();
        };
        let metrics = reading.metrics();
        let mut alerts = Vec::new();

        let mut push = |kind, severity, value: f64, threshold: f64, message: String| {
            alerts.push(NewAlert {
                sensor_id,
                kind,
                severity,
                message,
                value: Some(value),
                threshold: Some(threshold),
            });
        };

        if let Some(t) = metrics.temperature {
            if t > self.high_temperature {
                push(
                    AlertKind::HighTemperature,
                    AlertSeverity::High,
                    t,
                    self.high_temperature,
                    format!("Temperature {t} °C is above {} °C", self.high_temperature),
                );
            } else if t < self.low_temperature {
                push(
                    AlertKind::LowTemperature,
                    AlertSeverity::High,
                    t,
                    self.low_temperature,
                    format!("Temperature {t} °C is below {} °C", self.low_temperature),
                );
            }
        }
        if let Some(m) = metrics.soil_moisture
            && m < self.low_soil_moisture
        {
            push(
                AlertKind::LowSoilMoisture,
                AlertSeverity::Medium,
                m,
                self.low_soil_moisture,
                format!("Soil moisture {m}% is below {}%", self.low_soil_moisture),
            );
        }
        if let Some(h) = metrics.humidity
            && h > self.high_humidity
        {
            push(
                AlertKind::HighHumidity,
                AlertSeverity::Low,
                h,
                self.high_humidity,
                format!("Humidity {h}% is above {}%", self.high_humidity),
            );
        }
        if let Some(b) = metrics.battery_level
            && b < self.low_battery
        {
            push(
                AlertKind::LowBattery,
                AlertSeverity::Medium,
                b,
                self.low_battery,
                format!("Battery level {b}% is below {}%", self.low_battery),
            );
        }

        alerts
    }
}
