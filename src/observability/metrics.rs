//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): front-end requests by method, status
//! - `proxy_request_duration_seconds` (histogram): front-end latency
//! - `proxy_upstream_health` (gauge): 1=healthy, 0=unhealthy, per node
//! - `proxy_upstream_failures_total` (counter): failures recorded per node
//! - `proxy_failover_total` (counter): moves to the next candidate, per balancer
//! - `proxy_health_probes_total` (counter): active probes per node and result
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels are node identifiers, never request data

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_health(upstream: &str, healthy: bool) {
    gauge!("proxy_upstream_health", "upstream" => upstream.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_upstream_failure(upstream: &str) {
    counter!("proxy_upstream_failures_total", "upstream" => upstream.to_string()).increment(1);
}

pub fn record_failover(balancer: &str) {
    counter!("proxy_failover_total", "balancer" => balancer.to_string()).increment(1);
}

pub fn record_probe(upstream: &str, healthy: bool) {
    let result = if healthy { "success" } else { "failure" };
    counter!(
        "proxy_health_probes_total",
        "upstream" => upstream.to_string(),
        "result" => result
    )
    .increment(1);
}
