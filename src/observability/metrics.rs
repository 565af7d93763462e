//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, rejections, bulkhead load)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `taskhub_requests_total` (counter): requests by method, status
//! - `taskhub_request_duration_seconds` (histogram): latency distribution
//! - `taskhub_gatekeeper_rejections_total` (counter): gate rejections by reason
//! - `taskhub_bulkhead_admitted_total` / `taskhub_bulkhead_rejected_total` (counter): by group
//! - `taskhub_bulkhead_in_flight` (gauge): current admissions per group
//! - `taskhub_retry_attempts_total` (counter): data-access retries by operation
//! - `taskhub_config_reloads_total` (counter): snapshot swaps by source
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are low-cardinality (no client addresses, no ids)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "taskhub_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("taskhub_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_gatekeeper_rejection(reason: &'static str) {
    counter!("taskhub_gatekeeper_rejections_total", "reason" => reason).increment(1);
}

pub fn record_bulkhead_admitted(group: &str, in_flight: usize) {
    counter!("taskhub_bulkhead_admitted_total", "group" => group.to_string()).increment(1);
    gauge!("taskhub_bulkhead_in_flight", "group" => group.to_string()).set(in_flight as f64);
}

pub fn record_bulkhead_rejected(group: &str) {
    counter!("taskhub_bulkhead_rejected_total", "group" => group.to_string()).increment(1);
}

pub fn record_bulkhead_released(group: &str, in_flight: usize) {
    gauge!("taskhub_bulkhead_in_flight", "group" => group.to_string()).set(in_flight as f64);
}

pub fn record_retry_attempt(operation: &'static str) {
    counter!("taskhub_retry_attempts_total", "operation" => operation).increment(1);
}

pub fn record_config_reload(source: &'static str) {
    counter!("taskhub_config_reloads_total", "source" => source).increment(1);
}
