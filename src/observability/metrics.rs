//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ethics_http_requests_total` (counter): responses by status
//! - `ethics_auth_failures_total` (counter): rejected tokens by reason
//! - `ethics_rate_limited_total` (counter): rate-limit rejections
//! - `ethics_audit_appends_total` (counter): ledger appends by event type
//! - `ethics_decryption_fallbacks_total` (counter): placeholder reads
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16) {
    counter!("ethics_http_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("ethics_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited() {
    counter!("ethics_rate_limited_total").increment(1);
}

pub fn record_audit_append(event_type: &str) {
    counter!("ethics_audit_appends_total", "event_type" => event_type.to_string()).increment(1);
}

pub fn record_decryption_fallback() {
    counter!("ethics_decryption_fallbacks_total").increment(1);
}
