//! Service entry point.

use std::process::ExitCode;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use service::{AppState, Config, Pipeline, Result};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: Store + 'static>(
    store: Arc<S>,
    store_backend: &'static str,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<()> {
    let pipeline = Pipeline::start(store, config).await;
    let app = service::create_app(AppState { store_backend }, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, store = store_backend, "starting sensor ingest service");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pipeline.shutdown().await;
    served?;
    Ok(())
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    service::telemetry::init_tracing(&config)?;
    let metrics_handle = service::telemetry::install_metrics()?;

    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;
            let store = PostgresStore::new(pool);
            store.run_migrations().await?;
            serve(Arc::new(store), "postgres", &config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            serve(Arc::new(InMemoryStore::new()), "memory", &config, metrics_handle).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => {
            tracing::info!("server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "service failed");
            eprintln!("sensor-ingest: {e}");
            ExitCode::FAILURE
        }
    }
}
