use thiserror::Error;

/// Errors that can occur when publishing.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker did not accept the message.
    #[error("Publish failed for {event_type}: {reason}")]
    PublishFailed { event_type: String, reason: String },

    /// The broker has been shut down.
    #[error("Broker closed")]
    Closed,
}

/// Error a handler returns to request redelivery.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
