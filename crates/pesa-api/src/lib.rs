//! # pesa-api: HTTP Service for M-Pesa STK Payments
//!
//! Axum service that drives the payment lifecycle:
//!
//! - **Checkout**: validate, record and push a payment to the payer's phone.
//! - **Webhook**: persist and apply asynchronous settlement results.
//! - **Reconciliation**: status queries for attempts whose webhook is late.
//! - **Service catalog**: catalog entries priced into checkouts.
//!
//! ## Storage
//!
//! State lives in an in-memory [`store::PaymentStore`] that writes through
//! to Postgres when `DATABASE_URL` is set.
//!
//! ## Observability
//!
//! Structured `tracing` logs, a `TraceLayer` per request, and Prometheus
//! metrics at `/metrics` (toggle with `PESA_METRICS_ENABLED`).

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod orchestration;
pub mod routes;
pub mod state;
pub mod store;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use crate::error::AppError;
pub use crate::state::AppState;

/// Maximum JSON body accepted by the payment and catalog routes.
pub const API_BODY_LIMIT: usize = 256 * 1024;

/// Assemble the application router.
///
/// Health probes and `/metrics` sit outside the request-metrics layer so
/// scrapes do not count themselves.
pub fn app(state: AppState) -> Router {
    let metrics_on = state.config.metrics_enabled;

    // The webhook bounds its own body and must acknowledge every delivery,
    // so it sits outside the request body limit.
    let mut api = Router::new()
        .merge(routes::payments::router())
        .merge(routes::services::router())
        .layer(DefaultBodyLimit::max(API_BODY_LIMIT))
        .merge(routes::callbacks::router());

    if metrics_on {
        api = api.layer(from_fn(middleware::metrics::metrics_middleware));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        unauthenticated =
            unauthenticated.route("/metrics", axum::routing::get(prometheus_metrics));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics: refresh domain gauges, then render the exposition text.
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    middleware::metrics::update_domain_gauges(&state.store);

    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Liveness probe: 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: checks the database when one is configured.
///
/// A missing gateway does not fail readiness; payment routes answer 503
/// and the webhook still records deliveries.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = state.store.pool() {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
