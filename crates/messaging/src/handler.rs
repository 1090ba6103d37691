use async_trait::async_trait;
use contracts::EventEnvelope;

use crate::{HandlerError, Result};

/// One delivery of a message to a subscriber.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub envelope: EventEnvelope,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,
}

/// Outbound side of the broker.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Hands an envelope to the broker. Success means the broker owns it.
    async fn publish(&self, envelope: &EventEnvelope) -> Result<()>;
}

/// Inbound side of the broker, invoked once per delivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Returns the unique name of this handler.
    fn name(&self) -> &'static str;

    /// Processes one delivery. An error asks the broker to redeliver.
    async fn handle(&self, delivery: &Delivery) -> std::result::Result<(), HandlerError>;
}
