//! In-process broker with redelivery and a dead-letter list.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use contracts::EventEnvelope;
use futures_util::future::join_all;
use tokio::sync::RwLock;

use crate::{BrokerError, Delivery, MessageHandler, Publisher, Result};

/// Redelivery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Deliveries per subscriber before a message is dead-lettered.
    pub max_attempts: u32,
    /// Wait before redelivery `n` is `n * retry_backoff`.
    pub retry_backoff: Duration,
    /// Most recent envelopes kept for [`InMemoryBroker::published`]. Zero
    /// keeps none.
    pub publish_log_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_backoff: Duration::from_millis(200),
            publish_log_capacity: 0,
        }
    }
}

/// A message a subscriber kept failing on.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub envelope: EventEnvelope,
    pub handler: &'static str,
    pub attempts: u32,
    pub error: String,
}

/// Topic-per-event-type broker living in the current process.
///
/// `publish` fans the envelope out to every subscriber of its event type and
/// returns once each has either accepted it or exhausted its attempts.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    config: BrokerConfig,
    subscriptions: Arc<RwLock<HashMap<String, Vec<Arc<dyn MessageHandler>>>>>,
    published: Arc<RwLock<VecDeque<EventEnvelope>>>,
    dead_letters: Arc<RwLock<Vec<DeadLetter>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryBroker {
    /// Creates a broker with the default redelivery policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker with a custom redelivery policy.
    pub fn with_config(config: BrokerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Subscribes `handler` to each of `event_types`.
    pub async fn subscribe(&self, event_types: &[&str], handler: Arc<dyn MessageHandler>) {
        let mut subscriptions = self.subscriptions.write().await;
        for event_type in event_types {
            subscriptions
                .entry((*event_type).to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }
        tracing::info!(handler = handler.name(), ?event_types, "handler subscribed");
    }

    /// Returns the number of handlers subscribed to `event_type`.
    pub async fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Returns the last envelopes accepted, oldest first, up to
    /// `publish_log_capacity` of them.
    pub async fn published(&self) -> Vec<EventEnvelope> {
        self.published.read().await.iter().cloned().collect()
    }

    /// Returns the messages that exhausted their attempts.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.read().await.clone()
    }

    /// Refuses further publishes.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    async fn deliver(&self, handler: Arc<dyn MessageHandler>, envelope: EventEnvelope) {
        let mut delivery = Delivery {
            envelope,
            attempt: 1,
        };

        loop {
            match handler.handle(&delivery).await {
                Ok(()) => return,
                Err(e) if delivery.attempt < self.config.max_attempts => {
                    tracing::warn!(
                        handler = handler.name(),
                        event_id = %delivery.envelope.event_id,
                        attempt = delivery.attempt,
                        error = %e,
                        "handler failed, redelivering"
                    );
                    metrics::counter!("broker_redeliveries_total").increment(1);
                    tokio::time::sleep(self.config.retry_backoff * delivery.attempt).await;
                    delivery.attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        handler = handler.name(),
                        event_id = %delivery.envelope.event_id,
                        attempts = delivery.attempt,
                        error = %e,
                        "handler failed permanently, dead-lettering"
                    );
                    metrics::counter!("broker_dead_letters_total").increment(1);
                    self.dead_letters.write().await.push(DeadLetter {
                        envelope: delivery.envelope,
                        handler: handler.name(),
                        attempts: delivery.attempt,
                        error: e.to_string(),
                    });
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    #[tracing::instrument(skip(self, envelope), fields(event_type = %envelope.event_type, event_id = %envelope.event_id))]
    async fn publish(&self, envelope: &EventEnvelope) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }

        let capacity = self.config.publish_log_capacity;
        if capacity > 0 {
            let mut published = self.published.write().await;
            if published.len() == capacity {
                published.pop_front();
            }
            published.push_back(envelope.clone());
        }

        let handlers = self
            .subscriptions
            .read()
            .await
            .get(&envelope.event_type)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            tracing::debug!("no subscribers");
            return Ok(());
        }

        join_all(
            handlers
                .into_iter()
                .map(|handler| self.deliver(handler, envelope.clone())),
        )
        .await;
        Ok(())
    }
}
