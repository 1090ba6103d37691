//! One handler per inbound integration event type.

mod owner;
mod sensor;

use async_trait::async_trait;
use contracts::IntegrationEvent;
use store::{ChangeSet, UnitOfWork};
use uuid::Uuid;

use crate::{HandleOutcome, MessageContext, Result};

pub use owner::{UserCreatedHandler, UserDeactivatedHandler, UserUpdatedHandler};
pub use sensor::{SensorDeactivatedHandler, SensorRegisteredHandler, SensorStatusChangedHandler};

/// Projects one integration event type into local state.
#[async_trait]
pub trait InboxHandler: Send + Sync {
    /// The event this handler consumes.
    type Event: IntegrationEvent;

    /// Returns the name of this handler.
    fn name(&self) -> &'static str;

    /// Handles one event. Only storage failures are errors.
    async fn handle(&self, event: &Self::Event, ctx: &MessageContext) -> Result<HandleOutcome>;
}

fn invalid(ctx: &MessageContext, reason: impl Into<String>) -> HandleOutcome {
    let reason = reason.into();
    tracing::warn!(
        event_id = %ctx.event_id,
        event_type = %ctx.event_type,
        %reason,
        "invalid payload, skipping"
    );
    HandleOutcome::Invalid(reason)
}

fn skipped(ctx: &MessageContext, target_id: impl Into<Uuid>, outcome: HandleOutcome) -> HandleOutcome {
    tracing::info!(
        event_id = %ctx.event_id,
        event_type = %ctx.event_type,
        target_id = %target_id.into(),
        outcome = outcome.as_str(),
        "event skipped"
    );
    outcome
}

async fn commit<S: UnitOfWork>(
    store: &S,
    changes: ChangeSet,
    ctx: &MessageContext,
    target_id: impl Into<Uuid>,
) -> Result<()> {
    let target_id = target_id.into();
    store.commit(changes).await.map_err(|e| {
        let err = ctx.fail(target_id, e);
        tracing::error!(error = %err, transient = err.is_transient(), "inbox commit failed");
        err
    })?;
    Ok(())
}

/// Column widths of the snapshot tables.
const MAX_NAME_LEN: usize = 255;
const MAX_ROLE_LEN: usize = 64;

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn exceeds(value: &str, max_chars: usize) -> bool {
    value.chars().count() > max_chars
}
