//! Owner snapshot mirrored from the identity service.

use chrono::{DateTime, Duration, Utc};
use common::OwnerId;
use serde::{Deserialize, Serialize};

use super::within_tolerance;

/// Profile attributes carried by user events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerDetails {
    pub name: String,
    pub email: String,
    pub role: Option<String>,
}

/// Read-optimized copy of a user owned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSnapshot {
    pub id: OwnerId,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Occurrence time of the last identity event applied.
    pub last_changed_at: DateTime<Utc>,
}

impl OwnerSnapshot {
    /// Builds an active snapshot for a user seen for the first time.
    pub fn create(
        id: OwnerId,
        details: OwnerDetails,
        occurred_on: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: details.name,
            email: details.email,
            role: details.role,
            is_active: true,
            created_at: now,
            updated_at: None,
            last_changed_at: occurred_on,
        }
    }

    pub fn details(&self) -> OwnerDetails {
        OwnerDetails {
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }

    /// Returns true if the snapshot already holds `details` as of
    /// `occurred_on`, give or take `tolerance`.
    pub fn is_duplicate(
        &self,
        details: &OwnerDetails,
        occurred_on: DateTime<Utc>,
        tolerance: Duration,
    ) -> bool {
        self.details() == *details
            && within_tolerance(self.last_changed_at, occurred_on, tolerance)
    }

    /// Returns true if an event at `occurred_on` predates the last one applied.
    pub fn is_older_than_last_change(&self, occurred_on: DateTime<Utc>) -> bool {
        occurred_on < self.last_changed_at
    }

    /// Overwrites the profile attributes. Liveness is left alone.
    pub fn update_details(
        &mut self,
        details: OwnerDetails,
        occurred_on: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.name = details.name;
        self.email = details.email;
        self.role = details.role;
        self.last_changed_at = occurred_on;
        self.updated_at = Some(now);
    }

    /// Marks the snapshot inactive as of `occurred_on`.
    ///
    /// Returns false, touching nothing, when it already was.
    pub fn deactivate(&mut self, occurred_on: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.last_changed_at = occurred_on;
        self.updated_at = Some(now);
        true
    }
}
