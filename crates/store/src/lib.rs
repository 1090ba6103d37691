//! Persistence for the sensor ingest service.
//!
//! Reads go through the per-entity store traits; every write is staged in a
//! [`ChangeSet`] and applied atomically by [`UnitOfWork::commit`].

pub mod change_set;
pub mod error;
pub mod liveness;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod query;
pub mod store;

pub use change_set::{AlertWrite, ChangeSet, SnapshotWrite};
pub use error::{Result, StoreError};
pub use liveness::Liveness;
pub use memory::InMemoryStore;
pub use outbox::{OutboxEntry, OutboxStatus};
pub use postgres::PostgresStore;
pub use query::ReadingQuery;
pub use store::{
    AlertStore, CommitReceipt, OutboxStore, OwnerSnapshotStore, ReadingStore, SensorSnapshotStore,
    Store, UnitOfWork,
};
