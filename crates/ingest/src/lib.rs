//! Write-side use cases of the sensor ingest service.
//!
//! Every use case builds its aggregates, maps their pending domain events to
//! integration events and stages both in one [`store::ChangeSet`]. A failed
//! commit therefore never leaves an event in the outbox, and a successful one
//! always does.

pub mod alerts;
pub mod context;
pub mod error;
pub mod mapping;
pub mod readings;

pub use alerts::AlertService;
pub use context::OperationContext;
pub use error::{IngestError, Result};
pub use readings::{BatchFailure, BatchIngestResult, IngestedReading, ReadingIngestService};
