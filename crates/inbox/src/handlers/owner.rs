use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OwnerId;
use contracts::{UserCreated, UserDeactivated, UserUpdated};
use domain::{OwnerDetails, OwnerSnapshot};
use store::{ChangeSet, Liveness, OwnerSnapshotStore, UnitOfWork};

use super::{
    InboxHandler, MAX_NAME_LEN, MAX_ROLE_LEN, commit, exceeds, invalid, is_blank, skipped,
};
use crate::{HandleOutcome, MessageContext, Result, StalenessPolicy};

fn validate_profile(
    owner_id: OwnerId,
    name: &str,
    email: &str,
    role: &Option<String>,
) -> std::result::Result<OwnerDetails, &'static str> {
    if owner_id.is_nil() {
        return Err("owner_id is nil");
    }
    if is_blank(name) {
        return Err("name is required");
    }
    if is_blank(email) {
        return Err("email is required");
    }
    if exceeds(name.trim(), MAX_NAME_LEN) || exceeds(email.trim(), MAX_NAME_LEN) {
        return Err("name and email are limited to 255 characters");
    }
    if role.as_deref().is_some_and(|role| exceeds(role, MAX_ROLE_LEN)) {
        return Err("role is limited to 64 characters");
    }
    Ok(OwnerDetails {
        name: name.trim().to_string(),
        email: email.trim().to_string(),
        role: role.clone(),
    })
}

/// Duplicate and staleness checks shared by create and update.
async fn apply_profile<S>(
    store: &S,
    policy: StalenessPolicy,
    mut snapshot: OwnerSnapshot,
    details: OwnerDetails,
    occurred_on: DateTime<Utc>,
    ctx: &MessageContext,
) -> Result<HandleOutcome>
where
    S: UnitOfWork,
{
    if snapshot.is_duplicate(&details, occurred_on, policy.tolerance()) {
        return Ok(skipped(ctx, snapshot.id, HandleOutcome::Duplicate));
    }
    if snapshot.is_older_than_last_change(occurred_on) {
        return Ok(skipped(ctx, snapshot.id, HandleOutcome::Stale));
    }

    let id = snapshot.id;
    snapshot.update_details(details, occurred_on, Utc::now());
    let mut changes = ChangeSet::new();
    changes.update_owner(snapshot);
    commit(store, changes, ctx, id).await?;
    Ok(HandleOutcome::Applied)
}

/// Creates the owner snapshot for a new user.
///
/// A user that is already mirrored gets its profile refreshed instead; its
/// liveness is left as is.
pub struct UserCreatedHandler<S> {
    store: Arc<S>,
    policy: StalenessPolicy,
}

impl<S> UserCreatedHandler<S> {
    pub fn new(store: Arc<S>, policy: StalenessPolicy) -> Self {
        Self { store, policy }
    }
}

#[async_trait]
impl<S> InboxHandler for UserCreatedHandler<S>
where
    S: OwnerSnapshotStore + UnitOfWork,
{
    type Event = UserCreated;

    fn name(&self) -> &'static str {
        "UserCreatedHandler"
    }

    #[tracing::instrument(skip_all, fields(event_id = %ctx.event_id, correlation_id = %ctx.correlation_id, owner_id = %event.owner_id))]
    async fn handle(&self, event: &UserCreated, ctx: &MessageContext) -> Result<HandleOutcome> {
        let details = match validate_profile(event.owner_id, &event.name, &event.email, &event.role) {
            Ok(details) => details,
            Err(reason) => return Ok(invalid(ctx, reason)),
        };

        let existing = self
            .store
            .get_owner(event.owner_id, Liveness::IncludeInactive)
            .await
            .map_err(|e| ctx.fail(event.owner_id, e))?;

        let outcome = match existing {
            Some(snapshot) => {
                apply_profile(
                    self.store.as_ref(),
                    self.policy,
                    snapshot,
                    details,
                    event.occurred_on,
                    ctx,
                )
                .await?
            }
            None => {
                let mut changes = ChangeSet::new();
                changes.add_owner(OwnerSnapshot::create(
                    event.owner_id,
                    details,
                    event.occurred_on,
                    Utc::now(),
                ));
                commit(self.store.as_ref(), changes, ctx, event.owner_id).await?;
                HandleOutcome::Created
            }
        };

        if outcome.is_write() {
            tracing::info!(outcome = outcome.as_str(), "owner snapshot stored");
        }
        Ok(outcome)
    }
}

/// Refreshes the profile of a mirrored user.
pub struct UserUpdatedHandler<S> {
    store: Arc<S>,
    policy: StalenessPolicy,
}

impl<S> UserUpdatedHandler<S> {
    pub fn new(store: Arc<S>, policy: StalenessPolicy) -> Self {
        Self { store, policy }
    }
}

#[async_trait]
impl<S> InboxHandler for UserUpdatedHandler<S>
where
    S: OwnerSnapshotStore + UnitOfWork,
{
    type Event = UserUpdated;

    fn name(&self) -> &'static str {
        "UserUpdatedHandler"
    }

    #[tracing::instrument(skip_all, fields(event_id = %ctx.event_id, correlation_id = %ctx.correlation_id, owner_id = %event.owner_id))]
    async fn handle(&self, event: &UserUpdated, ctx: &MessageContext) -> Result<HandleOutcome> {
        let details = match validate_profile(event.owner_id, &event.name, &event.email, &event.role) {
            Ok(details) => details,
            Err(reason) => return Ok(invalid(ctx, reason)),
        };

        let Some(snapshot) = self
            .store
            .get_owner(event.owner_id, Liveness::IncludeInactive)
            .await
            .map_err(|e| ctx.fail(event.owner_id, e))?
        else {
            return Ok(skipped(ctx, event.owner_id, HandleOutcome::NotFound));
        };

        let outcome = apply_profile(
            self.store.as_ref(),
            self.policy,
            snapshot,
            details,
            event.occurred_on,
            ctx,
        )
        .await?;
        if outcome.is_write() {
            tracing::info!("owner profile updated");
        }
        Ok(outcome)
    }
}

/// Soft-deletes the owner snapshot.
pub struct UserDeactivatedHandler<S> {
    store: Arc<S>,
}

impl<S> UserDeactivatedHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> InboxHandler for UserDeactivatedHandler<S>
where
    S: OwnerSnapshotStore + UnitOfWork,
{
    type Event = UserDeactivated;

    fn name(&self) -> &'static str {
        "UserDeactivatedHandler"
    }

    #[tracing::instrument(skip_all, fields(event_id = %ctx.event_id, correlation_id = %ctx.correlation_id, owner_id = %event.owner_id))]
    async fn handle(&self, event: &UserDeactivated, ctx: &MessageContext) -> Result<HandleOutcome> {
        if event.owner_id.is_nil() {
            return Ok(invalid(ctx, "owner_id is nil"));
        }

        let Some(mut snapshot) = self
            .store
            .get_owner(event.owner_id, Liveness::IncludeInactive)
            .await
            .map_err(|e| ctx.fail(event.owner_id, e))?
        else {
            return Ok(skipped(ctx, event.owner_id, HandleOutcome::NotFound));
        };

        if !snapshot.is_active {
            return Ok(skipped(ctx, event.owner_id, HandleOutcome::Duplicate));
        }
        if snapshot.is_older_than_last_change(event.occurred_on) {
            return Ok(skipped(ctx, event.owner_id, HandleOutcome::Stale));
        }

        let now = Utc::now();
        snapshot.deactivate(event.occurred_on, now);
        let mut changes = ChangeSet::new();
        changes.delete_owner(snapshot.id, event.occurred_on, now);
        commit(self.store.as_ref(), changes, ctx, event.owner_id).await?;

        tracing::info!("owner snapshot deactivated");
        Ok(HandleOutcome::Applied)
    }
}
