/// Metrics and telemetry
///
/// Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Account lifecycle events (registrations, logins, confirmations, mail)

use axum::{
    extract::{MatchedPath, Request},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Instant;

lazy_static! {
    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();

    /// Account lifecycle events
    pub static ref ACCOUNT_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "account_events_total",
        "Total number of account lifecycle events",
        &["event"]
    )
    .unwrap();
}

/// Account lifecycle event labels
#[derive(Debug, Clone, Copy)]
pub enum AccountEvent {
    Registered,
    LoginSucceeded,
    LoginRejected,
    EmailConfirmed,
    VerificationEmailSent,
    VerificationEmailFailed,
}

impl AccountEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountEvent::Registered => "registered",
            AccountEvent::LoginSucceeded => "login_succeeded",
            AccountEvent::LoginRejected => "login_rejected",
            AccountEvent::EmailConfirmed => "email_confirmed",
            AccountEvent::VerificationEmailSent => "verification_email_sent",
            AccountEvent::VerificationEmailFailed => "verification_email_failed",
        }
    }
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record an account lifecycle event
pub fn record_account_event(event: AccountEvent) {
    ACCOUNT_EVENTS_TOTAL.with_label_values(&[event.as_str()]).inc();
}

/// Middleware recording count and latency of every request
///
/// Labels use the matched route template so path parameters such as
/// tokens and ids never become label values.
pub async fn track_http_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_metrics(),
    )
}
