//! # proposal-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the proposal lifecycle API.
//! Binds to configurable port (default 8080).

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use proposal_api::repository::{postgres, PostgresRepository, Repository};
use proposal_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Build configuration from environment.
    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;
    tracing::info!(?config, "configuration loaded");

    // Initialize database pool (optional, absent means in-memory only).
    let repository = match postgres::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })? {
        Some(pool) => Repository::Postgres(PostgresRepository::new(pool)),
        None => Repository::in_memory(),
    };

    let mut state = AppState::with_repository(config.clone(), repository);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => tracing::warn!("Prometheus recorder not installed: {e}. /metrics will return 404."),
    }

    // Report (never repair) invariant breaks left by earlier runs.
    match state.service.reconcile().await {
        Ok(findings) if findings.is_empty() => tracing::info!("startup reconciliation clean"),
        Ok(findings) => tracing::error!(
            findings = findings.len(),
            "startup reconciliation found integrity problems"
        ),
        Err(e) => tracing::error!("Startup reconciliation failed: {e}"),
    }

    let app = proposal_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Proposal API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
