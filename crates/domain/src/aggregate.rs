//! Core aggregate and domain event traits.

use std::fmt::Debug;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

/// Trait for domain events.
///
/// Domain events represent facts that have happened to one aggregate.
/// They are immutable, named in past tense, and internal to this service:
/// the public wire vocabulary is the integration event derived from them.
pub trait DomainEvent: Debug + Clone + Send + Sync {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns when the event happened (UTC).
    fn occurred_on(&self) -> DateTime<Utc>;
}

/// Trait for aggregate state.
///
/// Implementors hold the state of one aggregate. Every field is set from
/// inside [`Aggregate::apply`]; factories and behavior methods produce events
/// and hand them to [`Root::record`], never assigning fields themselves.
pub trait Aggregate: Debug + Clone + Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    ///
    /// Returns None until the creation event has been applied.
    fn id(&self) -> Option<AggregateId>;

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic and must not fail:
    /// events represent facts that have already been decided.
    fn apply(&mut self, event: &Self::Event);
}

/// Persisted version of an aggregate, used for optimistic concurrency control.
///
/// Version 0 means "never saved"; each committed domain event increments it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a new aggregate.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version after `count` more events.
    pub fn advanced_by(&self, count: usize) -> Self {
        Self(self.0 + count as i64)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An aggregate's state together with its uncommitted domain events.
///
/// `Root` is the only way to obtain a mutable aggregate: factories return a
/// `Root` holding exactly one creation event, behavior methods are inherent
/// methods on `Root<ConcreteAggregate>`, and the persistence layer calls
/// [`Root::mark_committed`] once the events have been saved.
#[derive(Debug, Clone)]
pub struct Root<A: Aggregate> {
    state: A,
    version: Version,
    uncommitted: Vec<A::Event>,
}

impl<A: Aggregate> Root<A> {
    /// Starts a brand-new aggregate with empty state.
    pub(crate) fn new() -> Self {
        Self {
            state: A::default(),
            version: Version::initial(),
            uncommitted: Vec::new(),
        }
    }

    /// Wraps state loaded from storage. No events are pending.
    pub fn rehydrate(state: A, version: Version) -> Self {
        Self {
            state,
            version,
            uncommitted: Vec::new(),
        }
    }

    /// Applies an event and queues it for the next commit.
    pub(crate) fn record(&mut self, event: A::Event) {
        self.state.apply(&event);
        self.uncommitted.push(event);
    }

    /// Returns the current state.
    pub fn state(&self) -> &A {
        &self.state
    }

    /// Returns the version the aggregate had when it was last persisted.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the version the aggregate will have once pending events commit.
    pub fn pending_version(&self) -> Version {
        self.version.advanced_by(self.uncommitted.len())
    }

    /// Returns the events recorded since the last commit, oldest first.
    pub fn uncommitted_events(&self) -> &[A::Event] {
        &self.uncommitted
    }

    /// Returns true if there are events waiting to be committed.
    pub fn has_uncommitted_events(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Clears pending events after a successful save.
    pub fn mark_committed(&mut self) {
        self.version = self.pending_version();
        self.uncommitted.clear();
    }

    /// Consumes the root, returning the bare state.
    pub fn into_state(self) -> A {
        self.state
    }
}

impl<A: Aggregate> Deref for Root<A> {
    type Target = A;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}
