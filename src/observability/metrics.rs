//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): responses by protocol, status code
//! - `gateway_upstream_calls_total` (counter): upstream exchanges by outcome
//! - `gateway_route_misses_total` (counter): unmatched requests by protocol
//! - `gateway_active_connections` (gauge): live reactor connections
//!
//! Recording is always safe; without an installed exporter the calls are
//! no-ops.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(protocol: &'static str, code: u16) {
    metrics::counter!("gateway_requests_total", "protocol" => protocol, "status" => code.to_string()).increment(1);
}

pub fn record_upstream(outcome: &'static str) {
    metrics::counter!("gateway_upstream_calls_total", "outcome" => outcome).increment(1);
}

pub fn record_route_miss(protocol: &'static str) {
    metrics::counter!("gateway_route_misses_total", "protocol" => protocol).increment(1);
}

pub fn set_active_connections(count: usize) {
    metrics::gauge!("gateway_active_connections").set(count as f64);
}
