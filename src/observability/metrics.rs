//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method, status, route
//! - `api_request_duration_seconds` (histogram): latency distribution
//! - `api_errors_total` (counter): error responses by status
//! - `api_rate_limited_total` (counter): rejected by the rate limiter
//! - `api_sanitized_total` (counter): requests rewritten by a sanitizer
//!
//! Recording is always cheap; without an installed recorder the macros are no-ops.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::Label;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("route", route.to_string()),
    ];
    metrics::counter!("api_requests_total", labels.clone()).increment(1);
    metrics::histogram!("api_request_duration_seconds", labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_error(status: u16) {
    metrics::counter!("api_errors_total", "status" => status.to_string()).increment(1);
}

pub fn record_rate_limited() {
    metrics::counter!("api_rate_limited_total").increment(1);
}

pub fn record_sanitized(kind: &'static str) {
    metrics::counter!("api_sanitized_total", "kind" => kind).increment(1);
}
