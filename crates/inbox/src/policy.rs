//! Duplicate detection window.

use chrono::Duration;

/// How far apart two events may be and still count as the same change.
///
/// Producers stamp `occurred_on` with their own clock, so an event that
/// restates the stored value within `tolerance` of the stored change time is
/// treated as a redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    tolerance: Duration,
}

impl StalenessPolicy {
    pub const DEFAULT_TOLERANCE_SECS: u64 = 5;
    /// Upper bound; wider windows are clamped to one day.
    pub const MAX_TOLERANCE_SECS: u64 = 24 * 60 * 60;

    pub fn new(tolerance: Duration) -> Self {
        let max = Duration::seconds(Self::MAX_TOLERANCE_SECS as i64);
        Self {
            tolerance: tolerance.clamp(Duration::zero(), max),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(secs.min(Self::MAX_TOLERANCE_SECS) as i64))
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::from_secs(Self::DEFAULT_TOLERANCE_SECS)
    }
}
