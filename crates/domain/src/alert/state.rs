//! Alert state machine.

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// The state of an alert in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Acknowledged ──► Resolved
///    │                            ▲
///    └────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AlertStatus {
    /// Raised and not yet seen by an operator.
    #[default]
    Pending,

    /// An operator has seen the alert.
    Acknowledged,

    /// The condition was handled (terminal state).
    Resolved,
}

impl AlertStatus {
    /// Returns true if the alert can be acknowledged in this state.
    pub fn can_acknowledge(&self) -> bool {
        matches!(self, AlertStatus::Pending)
    }

    /// Returns true if the alert can be resolved in this state.
    pub fn can_resolve(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "Pending",
            AlertStatus::Acknowledged => "Acknowledged",
            AlertStatus::Resolved => "Resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(AlertStatus::Pending),
            "Acknowledged" => Ok(AlertStatus::Acknowledged),
            "Resolved" => Ok(AlertStatus::Resolved),
            other => Err(UnknownVariant::new("alert status", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_alerts_can_be_acknowledged() {
        assert!(AlertStatus::Pending.can_acknowledge());
        assert!(!AlertStatus::Acknowledged.can_acknowledge());
        assert!(!AlertStatus::Resolved.can_acknowledge());
    }

    #[test]
    fn resolved_is_terminal() {
        assert!(AlertStatus::Pending.can_resolve());
        assert!(AlertStatus::Acknowledged.can_resolve());
        assert!(!AlertStatus::Resolved.can_resolve());
    }

    #[test]
    fn parses_its_own_names() {
        for status in [
            AlertStatus::Pending,
            AlertStatus::Acknowledged,
            AlertStatus::Resolved,
        ] {
            assert_eq!(status.as_str().parse::<AlertStatus>(), Ok(status));
        }
        assert!("Closed".parse::<AlertStatus>().is_err());
    }
}
