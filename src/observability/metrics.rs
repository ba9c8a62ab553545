//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by kind (`http`/`websocket`) and status
//! - `proxy_request_duration_seconds` (histogram): time to response or upgrade
//! - `proxy_relay_sessions_active` (gauge): open WebSocket relay sessions
//! - `proxy_relay_sessions_total` (counter): finished sessions by how they ended

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one handled request.
pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    counter!("proxy_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
    histogram!("proxy_request_duration_seconds", "kind" => kind).record(start.elapsed().as_secs_f64());
}

/// Update the open-session gauge.
pub fn record_sessions_active(active: u64) {
    gauge!("proxy_relay_sessions_active").set(active as f64);
}

/// Record how a relay session ended.
pub fn record_session_end(end: &'static str) {
    counter!("proxy_relay_sessions_total", "end" => end).increment(1);
}
