//! Local mirrors of state owned by other services.
//!
//! Snapshots are keyed by the remote aggregate's id and never physically
//! deleted: their lifecycle is the `is_active` flag.

mod owner;
mod sensor;
mod status;

pub use owner::{OwnerDetails, OwnerSnapshot};
pub use sensor::{SensorDetails, SensorSnapshot};
pub use status::OperationalStatus;

use chrono::{DateTime, Duration, Utc};

/// Returns true if `last` is no earlier than `occurred_on - tolerance`.
///
/// A window reaching past the representable range covers everything.
pub(crate) fn within_tolerance(
    last: DateTime<Utc>,
    occurred_on: DateTime<Utc>,
    tolerance: Duration,
) -> bool {
    occurred_on
        .checked_sub_signed(tolerance)
        .is_none_or(|floor| last >= floor)
}
