//! Sensor snapshot mirrored from the farm service.

use chrono::{DateTime, Duration, Utc};
use common::{OwnerId, PlotId, PropertyId, SensorId};
use serde::{Deserialize, Serialize};

use super::{OperationalStatus, within_tolerance};

/// Descriptive attributes carried by a registration event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDetails {
    pub owner_id: OwnerId,
    pub property_id: PropertyId,
    pub plot_id: PlotId,
    pub label: Option<String>,
    pub plot_name: String,
    pub property_name: String,
}

/// Read-optimized copy of a sensor owned by the farm service.
///
/// `is_active` gates the reading write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub id: SensorId,
    pub owner_id: OwnerId,
    pub property_id: PropertyId,
    pub plot_id: PlotId,
    pub label: Option<String>,
    pub plot_name: String,
    pub property_name: String,
    pub status: OperationalStatus,
    pub status_reason: Option<String>,
    pub last_status_change_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SensorSnapshot {
    /// Builds a snapshot for a sensor seen for the first time.
    pub fn register(
        id: SensorId,
        details: SensorDetails,
        status: OperationalStatus,
        occurred_on: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id: details.owner_id,
            property_id: details.property_id,
            plot_id: details.plot_id,
            label: details.label,
            plot_name: details.plot_name,
            property_name: details.property_name,
            status,
            status_reason: None,
            last_status_change_at: Some(occurred_on),
            is_active: status.is_active(),
            created_at: now,
            updated_at: None,
        }
    }

    /// Returns the descriptive attributes.
    pub fn details(&self) -> SensorDetails {
        SensorDetails {
            owner_id: self.owner_id,
            property_id: self.property_id,
            plot_id: self.plot_id,
            label: self.label.clone(),
            plot_name: self.plot_name.clone(),
            property_name: self.property_name.clone(),
        }
    }

    /// Overwrites the descriptive attributes. Liveness is left alone.
    ///
    /// Returns false, touching nothing, when the details are unchanged.
    pub fn refresh_details(&mut self, details: SensorDetails, now: DateTime<Utc>) -> bool {
        if self.details() == details {
            return false;
        }
        self.owner_id = details.owner_id;
        self.property_id = details.property_id;
        self.plot_id = details.plot_id;
        self.label = details.label;
        self.plot_name = details.plot_name;
        self.property_name = details.property_name;
        self.updated_at = Some(now);
        true
    }

    /// Records a status change reported at `occurred_on`.
    ///
    /// Liveness follows the status: `Active` reactivates, anything else
    /// deactivates.
    pub fn change_status(
        &mut self,
        status: OperationalStatus,
        reason: Option<String>,
        occurred_on: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.status = status;
        self.status_reason = reason;
        self.is_active = status.is_active();
        self.last_status_change_at = Some(occurred_on);
        self.updated_at = Some(now);
    }

    /// Returns true if the snapshot already reflects `status` as of
    /// `occurred_on`, give or take `tolerance`.
    pub fn is_duplicate_status(
        &self,
        status: OperationalStatus,
        occurred_on: DateTime<Utc>,
        tolerance: Duration,
    ) -> bool {
        self.status == status
            && self.is_active == status.is_active()
            && self
                .last_status_change_at
                .is_some_and(|last| within_tolerance(last, occurred_on, tolerance))
    }

    /// Returns true if a status change at `occurred_on` predates the last
    /// one applied.
    pub fn is_older_than_last_change(&self, occurred_on: DateTime<Utc>) -> bool {
        self.last_status_change_at
            .is_some_and(|last| occurred_on < last)
    }

    /// Records a deactivation reported at `occurred_on`.
    ///
    /// The status becomes `Inactive` and the change time is stamped, so a
    /// status event that predates the deactivation reads as stale. Returns
    /// false, touching nothing, when the sensor already is deactivated.
    pub fn deactivate(
        &mut self,
        reason: Option<String>,
        occurred_on: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_deactivated() {
            return false;
        }
        self.change_status(OperationalStatus::Inactive, reason, occurred_on, now);
        true
    }

    pub fn is_deactivated(&self) -> bool {
        self.status == OperationalStatus::Inactive && !self.is_active
    }
}
