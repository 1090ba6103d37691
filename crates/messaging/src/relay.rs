//! Moves committed outbox entries onto the broker.

use std::sync::Arc;
use std::time::Duration;

use store::{OutboxStore, StoreError};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

use crate::Publisher;

/// How often `run` prunes published entries when a retention is set.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub published: usize,
    pub failed: usize,
}

impl RelayReport {
    /// Returns true if the pass found nothing to publish.
    pub fn is_idle(&self) -> bool {
        self.published == 0 && self.failed == 0
    }
}

/// Polls the outbox and publishes what it finds.
///
/// An entry is marked published only after the broker accepted it, so a crash
/// in between republishes it on the next pass.
pub struct OutboxRelay<S, P> {
    store: Arc<S>,
    publisher: Arc<P>,
    max_attempts: u32,
    retention: Option<Duration>,
}

impl<S, P> OutboxRelay<S, P>
where
    S: OutboxStore,
    P: Publisher,
{
    /// Creates a relay that gives up on an entry after `max_attempts` failures.
    pub fn new(store: Arc<S>, publisher: Arc<P>, max_attempts: u32) -> Self {
        Self {
            store,
            publisher,
            max_attempts,
            retention: None,
        }
    }

    /// Keeps published entries for `retention`, then prunes them.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Deletes published entries older than the retention window.
    ///
    /// Does nothing when no retention is set.
    pub async fn prune(&self) -> Result<usize, StoreError> {
        let Some(retention) = self.retention else {
            return Ok(0);
        };
        let pruned = self.store.prune_published(retention).await?;
        if pruned > 0 {
            metrics::counter!("outbox_entries_pruned_total").increment(pruned as u64);
            tracing::info!(pruned, "pruned published outbox entries");
        }
        Ok(pruned)
    }

    /// Publishes up to `batch_size` pending entries, oldest first.
    ///
    /// A publish failure is recorded on the entry and does not stop the
    /// batch. Store errors abort the pass.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch_pending(&self, batch_size: usize) -> Result<RelayReport, StoreError> {
        let entries = self
            .store
            .fetch_unpublished(batch_size, self.max_attempts)
            .await?;
        let mut report = RelayReport::default();

        for entry in entries {
            match self.publisher.publish(&entry.envelope).await {
                Ok(()) => {
                    self.store.mark_published(entry.id).await?;
                    metrics::counter!("outbox_events_published_total").increment(1);
                    report.published += 1;
                }
                Err(e) => {
                    self.store.mark_failed(entry.id, &e.to_string()).await?;
                    metrics::counter!("outbox_publish_failures_total").increment(1);
                    report.failed += 1;

                    let attempts = entry.attempts + 1;
                    if attempts >= self.max_attempts {
                        tracing::error!(
                            entry_id = %entry.id,
                            event_id = %entry.envelope.event_id,
                            event_type = %entry.envelope.event_type,
                            attempts,
                            error = %e,
                            "outbox entry exhausted its attempts"
                        );
                    } else {
                        tracing::warn!(
                            entry_id = %entry.id,
                            event_id = %entry.envelope.event_id,
                            attempts,
                            error = %e,
                            "publish failed, will retry"
                        );
                    }
                }
            }
        }

        if !report.is_idle() {
            tracing::info!(
                published = report.published,
                failed = report.failed,
                "relay pass complete"
            );
        }
        Ok(report)
    }

    /// Runs relay passes every `every` until `shutdown` flips to true.
    pub async fn run(&self, every: Duration, batch_size: usize, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_ms = every.as_millis() as u64, batch_size, "outbox relay started");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pruner = interval(PRUNE_INTERVAL);
        pruner.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.dispatch_pending(batch_size).await {
                        tracing::error!(error = %e, "outbox relay pass failed");
                    }
                }
                _ = pruner.tick(), if self.retention.is_some() => {
                    if let Err(e) = self.prune().await {
                        tracing::error!(error = %e, "outbox prune failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("outbox relay stopped");
    }
}
