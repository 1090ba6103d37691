//! Sensor ingest service wiring.
//!
//! Builds the store, broker, inbox and outbox relay from [`Config`], and
//! serves the operational endpoints (`/health`, `/metrics`) with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod telemetry;

pub use config::{Config, ConfigError, LogFormat};
pub use error::{Result, ServiceError};
pub use pipeline::Pipeline;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

/// State shared with the HTTP handlers.
#[derive(Debug, Clone, Copy)]
pub struct AppState {
    /// `"memory"` or `"postgres"`.
    pub store_backend: &'static str,
}

/// Creates the Axum router for the operational endpoints.
pub fn create_app(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .with_state(state)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}
