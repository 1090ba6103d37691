//! Outbox entries staged alongside business writes.

use chrono::{DateTime, Utc};
use contracts::EventEnvelope;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an outbox entry in the delivery pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Committed but not yet published.
    Pending,
    /// Handed to the broker.
    Published,
    /// The last publish attempt failed. Retried until attempts run out.
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Published => "published",
            OutboxStatus::Failed => "failed",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OutboxStatus::Pending),
            "published" => Some(OutboxStatus::Published),
            "failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

/// One integration event waiting in, or delivered from, the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Unique identifier for this outbox entry.
    pub id: Uuid,

    /// The integration event, ready to publish.
    pub envelope: EventEnvelope,

    /// Current delivery status.
    pub status: OutboxStatus,

    /// When the entry was staged.
    pub created_at: DateTime<Utc>,

    /// When the entry was last published or failed.
    pub processed_at: Option<DateTime<Utc>>,

    /// Number of publish attempts so far.
    pub attempts: u32,

    /// Last publish error, if any.
    pub last_error: Option<String>,
}

impl OutboxEntry {
    /// Creates a pending entry for an envelope.
    pub fn new(envelope: EventEnvelope) -> Self {
        Self {
            id: Uuid::new_v4(),
            envelope,
            status: OutboxStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// Returns true if the relay should still try to publish this entry.
    pub fn is_deliverable(&self, max_attempts: u32) -> bool {
        self.status != OutboxStatus::Published && self.attempts < max_attempts
    }

    /// Returns true if the entry was published before `cutoff`.
    pub fn published_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Published && self.processed_at.is_some_and(|at| at < cutoff)
    }

    pub(crate) fn mark_published(&mut self, at: DateTime<Utc>) {
        self.status = OutboxStatus::Published;
        self.processed_at = Some(at);
        self.attempts += 1;
    }

    pub(crate) fn mark_failed(&mut self, error: &str, at: DateTime<Utc>) {
        self.status = OutboxStatus::Failed;
        self.processed_at = Some(at);
        self.attempts += 1;
        self.last_error = Some(error.to_string());
    }
}

/// Oldest publish time kept by a prune with `retention`.
///
/// `None` when the window reaches past the representable range, in which
/// case nothing is old enough to prune.
pub(crate) fn retention_cutoff(retention: std::time::Duration, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(retention)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{AggregateId, CorrelationId};

    fn entry() -> OutboxEntry {
        let envelope = EventEnvelope::builder()
            .event_type("SensorIngested")
            .aggregate_id(AggregateId::new())
            .correlation_id(CorrelationId::new())
            .source("IngestReading")
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap();
        OutboxEntry::new(envelope)
    }

    #[test]
    fn failed_entries_stay_deliverable_until_attempts_run_out() {
        let mut entry = entry();
        assert!(entry.is_deliverable(2));

        entry.mark_failed("broker down", Utc::now());
        assert_eq!(entry.status, OutboxStatus::Failed);
        assert!(entry.is_deliverable(2));

        entry.mark_failed("broker down", Utc::now());
        assert!(!entry.is_deliverable(2));
        assert_eq!(entry.last_error.as_deref(), Some("broker down"));
    }

    #[test]
    fn only_published_entries_age_out() {
        let now = Utc::now();
        let mut entry = entry();
        assert!(!entry.published_before(now + chrono::Duration::hours(1)));

        entry.mark_published(now);
        assert!(entry.published_before(now + chrono::Duration::seconds(1)));
        assert!(!entry.published_before(now));
    }

    #[test]
    fn huge_retention_prunes_nothing() {
        assert!(retention_cutoff(std::time::Duration::MAX, Utc::now()).is_none());
        assert!(retention_cutoff(std::time::Duration::from_secs(60), Utc::now()).is_some());
    }

    #[test]
    fn published_entries_are_not_deliverable() {
        let mut entry = entry();
        entry.mark_published(Utc::now());
        assert!(!entry.is_deliverable(10));
        assert_eq!(entry.attempts, 1);
    }

    #[test]
    fn status_names_round_trip() {
        for status in [
            OutboxStatus::Pending,
            OutboxStatus::Published,
            OutboxStatus::Failed,
        ] {
            assert_eq!(OutboxStatus::parse(status.as_str()), Some(status));
        }
    }
}
