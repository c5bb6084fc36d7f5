//! Prometheus metrics exposition
//!
//! - `http_requests_total` (counter): labels `status`, `method`
//! - `http_request_duration_seconds` (histogram): label `status`
//! - `auth_checks_total` (counter): labels `scheme`, `outcome`
//! - `login_steps_total` (counter): labels `step`, `result`
//! - `launcher_authorizations_total` (counter): label `result`

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use tracing::Instrument;

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("http_request_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The request duration renders as a histogram (`_bucket` lines) rather than
/// the default summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed request with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "status" => status_str.clone(),
        "method" => method.to_string()
    )
    .increment(1);
    metrics::histogram!("http_request_duration_seconds", "status" => status_str)
        .record(duration_secs);
}

/// Record one authorization decision.
pub fn record_auth_check(scheme: &'static str, outcome: &'static str) {
    metrics::counter!("auth_checks_total", "scheme" => scheme, "outcome" => outcome).increment(1);
}

/// Record one step of the browser login flow.
pub fn record_login_step(step: &'static str, result: &'static str) {
    metrics::counter!("login_steps_total", "step" => step, "result" => result).increment(1);
}

/// Record one product-key redemption attempt.
pub fn record_launcher_authorization(result: &'static str) {
    metrics::counter!("launcher_authorizations_total", "result" => result).increment(1);
}

/// Middleware: tag the request with an id, log it, and record its metrics.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path
    );

    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let elapsed = started.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    span.in_scope(|| tracing::debug!(status, elapsed_secs = elapsed, "request completed"));
    record_request(status, &method, elapsed);
    response
}
