//! Wires the store, broker, inbox and outbox relay into one running unit.

use std::sync::Arc;

use domain::AlertRules;
use inbox::{InboxDispatcher, StalenessPolicy};
use ingest::{AlertService, ReadingIngestService};
use messaging::{BrokerConfig, InMemoryBroker, OutboxRelay};
use store::Store;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;

/// Use cases plus the background relay loop over one store.
///
/// The broker is in-process: it carries this service's own outbox events and
/// whatever is published into it through [`Pipeline::broker`]. Remote
/// `SensorRegistered` and `User*` events reach the inbox only if a transport
/// adapter publishes them there. `readings` and `alerts` are the entry points
/// for such adapters and for embedding callers; the binary itself only runs
/// the relay and the operational endpoints.
pub struct Pipeline<S> {
    pub broker: Arc<InMemoryBroker>,
    pub readings: Arc<ReadingIngestService<S>>,
    pub alerts: Arc<AlertService<S>>,
    pub relay: Arc<OutboxRelay<S, InMemoryBroker>>,
    shutdown: watch::Sender<bool>,
    relay_task: JoinHandle<()>,
}

impl<S: Store + 'static> Pipeline<S> {
    /// Subscribes the inbox to the broker and spawns the relay loop.
    pub async fn start(store: Arc<S>, config: &Config) -> Self {
        let broker = Arc::new(InMemoryBroker::with_config(BrokerConfig {
            max_attempts: config.broker_max_attempts,
            retry_backoff: config.broker_retry_backoff,
            ..BrokerConfig::default()
        }));

        let dispatcher = Arc::new(InboxDispatcher::new(
            Arc::clone(&store),
            StalenessPolicy::from_secs(config.staleness_tolerance_secs),
        ));
        broker.subscribe(dispatcher.event_types(), dispatcher.clone()).await;

        let relay = Arc::new(
            OutboxRelay::new(
                Arc::clone(&store),
                Arc::clone(&broker),
                config.broker_max_attempts,
            )
            .with_retention(config.outbox_retention),
        );
        let (shutdown, shutdown_rx) = watch::channel(false);
        let relay_task = {
            let relay = Arc::clone(&relay);
            let every = config.outbox_poll_interval;
            let batch_size = config.outbox_batch_size;
            tokio::spawn(async move { relay.run(every, batch_size, shutdown_rx).await })
        };

        tracing::info!(
            inbox_event_types = dispatcher.event_types().len(),
            poll_interval_ms = config.outbox_poll_interval.as_millis() as u64,
            "pipeline started"
        );

        Self {
            broker,
            readings: Arc::new(
                ReadingIngestService::new(Arc::clone(&store)).with_alert_rules(AlertRules::default()),
            ),
            alerts: Arc::new(AlertService::new(store)),
            relay,
            shutdown,
            relay_task,
        }
    }

    /// Stops the relay loop and closes the broker.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.relay_task.await {
            tracing::error!(error = %e, "outbox relay task panicked");
        }
        self.broker.close();
        tracing::info!("pipeline stopped");
    }
}
