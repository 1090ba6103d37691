//! Startup errors for the service binary.

use metrics_exporter_prometheus::BuildError;
use store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Anything that can stop the service from starting or serving.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
