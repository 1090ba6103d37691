//! Alert aggregate.
//!
//! An alert is raised against a sensor when a reading crosses a threshold
//! (or by an operator), then acknowledged and resolved.

mod aggregate;
mod events;
mod rules;
mod state;
mod value_objects;

pub use aggregate::{
    Alert, AlertRecord, MAX_MESSAGE_LEN, MAX_RESOLUTION_NOTES_LEN, NewAlert,
};
pub use events::{AlertAcknowledgedData, AlertEvent, AlertRaisedData, AlertResolvedData};
pub use rules::AlertRules;
pub use state::AlertStatus;
pub use value_objects::{AlertKind, AlertSeverity};

use thiserror::Error;

/// Errors returned by alert behaviors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    /// The alert is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: AlertStatus,
        action: &'static str,
    },

    /// Resolution notes exceed the allowed length.
    #[error("Resolution notes too long: {len} characters (max {max})")]
    NotesTooLong { len: usize, max: usize },
}
