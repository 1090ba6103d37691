//! Alert value objects.

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// What condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    HighTemperature,
    LowTemperature,
    LowSoilMoisture,
    HighHumidity,
    LowBattery,
    /// Raised by an operator rather than a threshold rule.
    Custom,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::HighTemperature => "HighTemperature",
            AlertKind::LowTemperature => "LowTemperature",
            AlertKind::LowSoilMoisture => "LowSoilMoisture",
            AlertKind::HighHumidity => "HighHumidity",
            AlertKind::LowBattery => "LowBattery",
            AlertKind::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HighTemperature" => Ok(AlertKind::HighTemperature),
            "LowTemperature" => Ok(AlertKind::LowTemperature),
            "LowSoilMoisture" => Ok(AlertKind::LowSoilMoisture),
            "HighHumidity" => Ok(AlertKind::HighHumidity),
            "LowBattery" => Ok(AlertKind::LowBattery),
            "Custom" => Ok(AlertKind::Custom),
            other => Err(UnknownVariant::new("alert kind", other)),
        }
    }
}

/// How urgent an alert is. Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "Low",
            AlertSeverity::Medium => "Medium",
            AlertSeverity::High => "High",
            AlertSeverity::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(AlertSeverity::Low),
            "Medium" => Ok(AlertSeverity::Medium),
            "High" => Ok(AlertSeverity::High),
            "Critical" => Ok(AlertSeverity::Critical),
            other => Err(UnknownVariant::new("alert severity", other)),
        }
    }
}
