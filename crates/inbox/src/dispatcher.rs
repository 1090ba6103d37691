//! Routes broker deliveries to the inbox handlers.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use contracts::{
    IntegrationEvent, IntegrationMessage, SensorDeactivated, SensorOperationalStatusChanged,
    SensorRegistered, UserCreated, UserDeactivated, UserUpdated,
};
use messaging::{Delivery, HandlerError, MessageHandler};
use store::{OwnerSnapshotStore, SensorSnapshotStore, UnitOfWork};

use crate::handlers::{
    InboxHandler, SensorDeactivatedHandler, SensorRegisteredHandler, SensorStatusChangedHandler,
    UserCreatedHandler, UserDeactivatedHandler, UserUpdatedHandler,
};
use crate::{HandleOutcome, MessageContext, Result, StalenessPolicy};

/// Every event type the inbox consumes.
pub const SUBSCRIBED_EVENT_TYPES: [&str; 6] = [
    SensorRegistered::EVENT_TYPE,
    SensorDeactivated::EVENT_TYPE,
    SensorOperationalStatusChanged::EVENT_TYPE,
    UserCreated::EVENT_TYPE,
    UserUpdated::EVENT_TYPE,
    UserDeactivated::EVENT_TYPE,
];

/// Decodes deliveries and hands each to the handler for its type.
///
/// Payloads that cannot be decoded are acknowledged with a warning; a
/// redelivery would fail the same way.
pub struct InboxDispatcher<S> {
    sensor_registered: SensorRegisteredHandler<S>,
    sensor_deactivated: SensorDeactivatedHandler<S>,
    sensor_status_changed: SensorStatusChangedHandler<S>,
    user_created: UserCreatedHandler<S>,
    user_updated: UserUpdatedHandler<S>,
    user_deactivated: UserDeactivatedHandler<S>,
}

impl<S> InboxDispatcher<S>
where
    S: SensorSnapshotStore + OwnerSnapshotStore + UnitOfWork,
{
    pub fn new(store: Arc<S>, policy: StalenessPolicy) -> Self {
        Self {
            sensor_registered: SensorRegisteredHandler::new(Arc::clone(&store)),
            sensor_deactivated: SensorDeactivatedHandler::new(Arc::clone(&store)),
            sensor_status_changed: SensorStatusChangedHandler::new(Arc::clone(&store), policy),
            user_created: UserCreatedHandler::new(Arc::clone(&store), policy),
            user_updated: UserUpdatedHandler::new(Arc::clone(&store), policy),
            user_deactivated: UserDeactivatedHandler::new(store),
        }
    }

    /// Returns the event types to subscribe this dispatcher to.
    pub fn event_types(&self) -> &'static [&'static str] {
        &SUBSCRIBED_EVENT_TYPES
    }

    /// Handles an already decoded message.
    pub async fn dispatch(
        &self,
        message: &IntegrationMessage,
        ctx: &MessageContext,
    ) -> Result<HandleOutcome> {
        match message {
            IntegrationMessage::SensorRegistered(e) => self.sensor_registered.handle(e, ctx).await,
            IntegrationMessage::SensorDeactivated(e) => {
                self.sensor_deactivated.handle(e, ctx).await
            }
            IntegrationMessage::SensorOperationalStatusChanged(e) => {
                self.sensor_status_changed.handle(e, ctx).await
            }
            IntegrationMessage::UserCreated(e) => self.user_created.handle(e, ctx).await,
            IntegrationMessage::UserUpdated(e) => self.user_updated.handle(e, ctx).await,
            IntegrationMessage::UserDeactivated(e) => self.user_deactivated.handle(e, ctx).await,
            IntegrationMessage::SensorIngested(_)
            | IntegrationMessage::AlertRaised(_)
            | IntegrationMessage::AlertAcknowledged(_)
            | IntegrationMessage::AlertResolved(_) => Ok(HandleOutcome::Ignored),
        }
    }

    /// Decodes and handles one delivery, recording outcome metrics.
    #[tracing::instrument(skip_all, fields(event_type = %delivery.envelope.event_type, event_id = %delivery.envelope.event_id, attempt = delivery.attempt))]
    pub async fn process(&self, delivery: &Delivery) -> Result<HandleOutcome> {
        let ctx = MessageContext::from_delivery(delivery);
        let started = Instant::now();

        let result = match IntegrationMessage::from_envelope(&delivery.envelope) {
            Ok(message) => self.dispatch(&message, &ctx).await,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable message, acknowledging");
                Ok(HandleOutcome::Invalid(e.to_string()))
            }
        };

        let outcome = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "error",
        };
        metrics::counter!(
            "inbox_events_total",
            "event_type" => delivery.envelope.event_type.clone(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("inbox_handler_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }
}

#[async_trait]
impl<S> MessageHandler for InboxDispatcher<S>
where
    S: SensorSnapshotStore + OwnerSnapshotStore + UnitOfWork + 'static,
{
    fn name(&self) -> &'static str {
        "InboxDispatcher"
    }

    async fn handle(&self, delivery: &Delivery) -> std::result::Result<(), HandlerError> {
        self.process(delivery).await?;
        Ok(())
    }
}
