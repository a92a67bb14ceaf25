//! # proposal-api: Orchestration and HTTP Surface for Proposal Documents
//!
//! Wires the pure lifecycle rules of `proposal-state` to a transactional
//! store and exposes them over Axum.
//!
//! ## API Surface
//!
//! | Prefix | Module | Auth |
//! |---|---|---|
//! | `/v1/documents/*` | [`routes::documents`] | bearer |
//! | `/v1/documents/{id}/integrity`, `/v1/integrity/*` | [`routes::integrity`] | bearer |
//! | `/openapi.json` | [`openapi`] | bearer |
//! | `/health/*`, `/metrics` | this module | none |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## Storage
//!
//! [`repository::Repository`] selects PostgreSQL when `DATABASE_URL` is set
//! and an in-memory store otherwise. Both satisfy the same CAS and atomic
//! sign contract.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) and `/metrics` are mounted outside the auth
/// middleware so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::documents::router())
        .merge(routes::integrity::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config));

    // Unauthenticated probes.
    let ops = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(middleware::metrics::render_metrics));

    Router::new()
        .merge(ops)
        .merge(api)
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: returns 200 when the document store answers.
async fn readiness(State(state): State<AppState>) -> Result<&'static str, (StatusCode, &'static str)> {
    match state.service.ping().await {
        Ok(()) => Ok("ready"),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            Err((StatusCode::SERVICE_UNAVAILABLE, "document store unavailable"))
        }
    }
}
