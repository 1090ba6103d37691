//! Message broker ports and the outbox relay.
//!
//! The broker is at-least-once: a handler that returns an error gets the
//! same message again, and a relay crash between publishing and marking an
//! entry published causes a second publish. Consumers must be idempotent.

pub mod broker;
pub mod error;
pub mod handler;
pub mod relay;

pub use broker::{BrokerConfig, DeadLetter, InMemoryBroker};
pub use error::{BrokerError, HandlerError, Result};
pub use handler::{Delivery, MessageHandler, Publisher};
pub use relay::{OutboxRelay, RelayReport};
