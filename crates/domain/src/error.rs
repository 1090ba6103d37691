//! Domain error types.

use thiserror::Error;

use crate::alert::AlertError;
use crate::validation::ValidationErrors;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// One or more structural checks failed.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// An alert behavior was refused.
    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    /// A textual value did not name a known variant.
    #[error(transparent)]
    UnknownVariant(#[from] UnknownVariant),
}

/// A string that does not name any variant of a closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    /// What was being parsed, e.g. "alert kind".
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
