//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, rule reloads)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `rules_proxy_requests_total` (counter): requests by method, status, decision
//! - `rules_proxy_request_duration_seconds` (histogram): latency distribution
//! - `rules_proxy_rule_reloads_total` (counter): reloads by outcome
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for method, status code and decision kind

use metrics::{counter, histogram, Label};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one handled request.
pub fn record_request(method: &str, status: u16, decision: &str, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("decision", decision.to_string()),
    ];
    counter!("rules_proxy_requests_total", labels.clone()).increment(1);
    histogram!("rules_proxy_request_duration_seconds", labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record a rule reload attempt.
pub fn record_reload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("rules_proxy_rule_reloads_total", "outcome" => outcome).increment(1);
}
