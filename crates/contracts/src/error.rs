use thiserror::Error;

/// Errors raised while building or decoding integration messages.
#[derive(Debug, Error)]
pub enum ContractError {
    /// A required envelope field was not provided.
    #[error("Missing envelope field: {0}")]
    MissingField(&'static str),

    /// The envelope names an event type this service does not know.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// The envelope was decoded as the wrong event type.
    #[error("Event type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// The payload could not be (de)serialized.
    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
