//! Metrics collection and exposition.
//!
//! # Metrics
//! - `signing_proxy_requests_total` (counter): inbound requests by method, status, kind
//! - `signing_proxy_request_duration_seconds` (histogram): time to response head
//! - `signing_proxy_upstream_calls_total` (counter): upstream calls by outcome
//! - `signing_proxy_nonce_allocations_total` (counter): allocations per ledger
//! - `signing_proxy_nonce_rollbacks_total` (counter): forced rollbacks per ledger
//! - `signing_proxy_issued_nonce` / `signing_proxy_mined_nonce` (gauges)
//! - `signing_proxy_sync_failures_total` (counter)
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, kind: &'static str, start: Instant) {
    counter!(
        "signing_proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "kind" => kind
    )
    .increment(1);
    histogram!("signing_proxy_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_call(outcome: &'static str) {
    counter!("signing_proxy_upstream_calls_total", "outcome" => outcome).increment(1);
}

pub fn record_nonce_allocation(ledger: &'static str, issued: u64) {
    counter!("signing_proxy_nonce_allocations_total", "ledger" => ledger).increment(1);
    gauge!("signing_proxy_issued_nonce", "ledger" => ledger).set(issued as f64);
}

pub fn record_nonce_observation(ledger: &'static str, mined: u64, issued: u64) {
    gauge!("signing_proxy_mined_nonce", "ledger" => ledger).set(mined as f64);
    gauge!("signing_proxy_issued_nonce", "ledger" => ledger).set(issued as f64);
}

pub fn record_nonce_rollback(ledger: &'static str) {
    counter!("signing_proxy_nonce_rollbacks_total", "ledger" => ledger).increment(1);
}

pub fn record_sync_failure() {
    counter!("signing_proxy_sync_failures_total").increment(1);
}
