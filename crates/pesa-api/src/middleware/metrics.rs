//! # Prometheus Metrics
//!
//! Recorded through the `metrics` facade; the binary installs the Prometheus
//! recorder from `metrics-exporter-prometheus` and `/metrics` renders it.
//! Without an installed recorder every call here is a no-op, which is how
//! the test suite runs.
//!
//! HTTP metrics are recorded in middleware (push model). Payment state
//! gauges are refreshed on each scrape (pull model).

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::store::PaymentStore;

pub const HTTP_REQUESTS_TOTAL: &str = "pesa_http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "pesa_http_request_duration_seconds";
pub const HTTP_ERRORS_TOTAL: &str = "pesa_http_errors_total";
pub const PAYMENTS_TOTAL: &str = "pesa_payments_total";
pub const CALLBACKS_RECEIVED_TOTAL: &str = "pesa_callbacks_received_total";
pub const CHECKOUTS_TOTAL: &str = "pesa_checkouts_total";
pub const CALLBACK_RECORDS_TOTAL: &str = "pesa_callback_records_total";
pub const RECONCILE_UNCONFIRMED_TOTAL: &str = "pesa_reconcile_unconfirmed_total";

/// Collapse UUID path segments to `{id}` to bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let hyphenated = segment.len() == 36
                && segment.chars().enumerate().all(|(i, c)| {
                    if i == 8 || i == 13 || i == 18 || i == 23 {
                        c == '-'
                    } else {
                        c.is_ascii_hexdigit()
                    }
                });
            let simple = segment.len() == 32 && segment.chars().all(|c| c.is_ascii_hexdigit());
            if hyphenated || simple {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records request count, latency and errors.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| normalize_path(request.uri().path()));
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();
    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.clone(),
        "path" => path.clone()
    )
    .record(duration);
    if status >= 400 {
        metrics::counter!(
            HTTP_ERRORS_TOTAL,
            "method" => method,
            "path" => path,
            "status" => status.to_string()
        )
        .increment(1);
    }

    response
}

/// Outcome of one checkout, as counted in `pesa_checkouts_total`.
pub fn record_checkout(outcome: &'static str) {
    metrics::counter!(CHECKOUTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Outcome of one webhook delivery, as counted in
/// `pesa_callbacks_received_total`.
pub fn record_callback(outcome: &'static str) {
    metrics::counter!(CALLBACKS_RECEIVED_TOTAL, "outcome" => outcome).increment(1);
}

/// A status query reported success for an attempt with no known receipt.
pub fn record_reconcile_unconfirmed() {
    metrics::counter!(RECONCILE_UNCONFIRMED_TOTAL).increment(1);
}

/// Refresh the domain gauges from the store.
pub fn update_domain_gauges(store: &PaymentStore) {
    for (state, count) in store.count_by_state() {
        metrics::gauge!(PAYMENTS_TOTAL, "state" => state.as_str()).set(count as f64);
    }
    metrics::gauge!(CALLBACK_RECORDS_TOTAL).set(store.callback_count() as f64);
}
