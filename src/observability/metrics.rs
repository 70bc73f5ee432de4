//! Metrics collection and exposition.
//!
//! # Metrics
//! - `supervisor_cycles_total` (counter)
//! - `supervisor_probe_results_total` (counter): by service, status
//! - `supervisor_restarts_total` (counter): by service, outcome
//! - `supervisor_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `supervisor_dns_reachable` / `supervisor_vip_present` (gauge): 1/0
//! - `supervisor_notifications_failed_total` (counter): by sink
//!
//! Recording is a no-op until a recorder is installed, so tests and the
//! one-shot CLI pay nothing.

use std::net::SocketAddr;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::persistence::state::BreakerState;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cycle() {
    counter!("supervisor_cycles_total").increment(1);
}

pub fn record_probe(service: &str, status: &str) {
    counter!(
        "supervisor_probe_results_total",
        "service" => service.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_restart(service: &str, outcome: &str) {
    counter!(
        "supervisor_restarts_total",
        "service" => service.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_breaker_state(service: &str, state: BreakerState) {
    gauge!("supervisor_breaker_state", "service" => service.to_string()).set(state.gauge());
}

pub fn record_network(dns_reachable: Option<bool>, vip_present: Option<bool>) {
    if let Some(up) = dns_reachable {
        gauge!("supervisor_dns_reachable").set(if up { 1.0 } else { 0.0 });
    }
    if let Some(present) = vip_present {
        gauge!("supervisor_vip_present").set(if present { 1.0 } else { 0.0 });
    }
}

pub fn record_notification_failure(sink: &str) {
    counter!("supervisor_notifications_failed_total", "sink" => sink.to_string()).increment(1);
}
