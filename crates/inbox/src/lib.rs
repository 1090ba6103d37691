//! Inbound side of the consistency layer.
//!
//! Each handler projects one integration event type into a local snapshot.
//! Handlers are idempotent: a redelivered, duplicate, stale or malformed
//! event is acknowledged without touching storage, and only infrastructure
//! failures come back as errors so the broker redelivers.
//!
//! - [`StalenessPolicy`] decides when an event restates what is already stored
//! - [`InboxHandler`] is implemented once per inbound event type
//! - [`InboxDispatcher`] decodes deliveries and routes them with a `match`

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod policy;

pub use context::{HandleOutcome, MessageContext};
pub use dispatcher::InboxDispatcher;
pub use error::{InboxError, Result};
pub use handlers::{
    InboxHandler, SensorDeactivatedHandler, SensorRegisteredHandler, SensorStatusChangedHandler,
    UserCreatedHandler, UserDeactivatedHandler, UserUpdatedHandler,
};
pub use policy::StalenessPolicy;
