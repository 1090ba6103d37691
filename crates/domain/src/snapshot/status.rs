//! Sensor operational status.

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// Operational status as reported by the farm service.
///
/// Only `Active` sensors accept readings; every other status collapses to an
/// inactive snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationalStatus {
    Active,
    Inactive,
    Maintenance,
    Faulty,
}

impl OperationalStatus {
    /// Returns true if a sensor in this status accepts readings.
    pub fn is_active(&self) -> bool {
        matches!(self, OperationalStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalStatus::Active => "Active",
            OperationalStatus::Inactive => "Inactive",
            OperationalStatus::Maintenance => "Maintenance",
            OperationalStatus::Faulty => "Faulty",
        }
    }
}

impl std::fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a status name, ignoring case and surrounding whitespace.
impl std::str::FromStr for OperationalStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        [
            OperationalStatus::Active,
            OperationalStatus::Inactive,
            OperationalStatus::Maintenance,
            OperationalStatus::Faulty,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
        .ok_or_else(|| UnknownVariant::new("operational status", s))
    }
}
