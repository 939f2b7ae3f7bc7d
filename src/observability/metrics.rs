//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define breaker metrics (decisions, transitions, degraded operation)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `breaker_decisions_total` (counter): allow outcomes by breaker, decision
//! - `breaker_degraded_total` (counter): store unreachable on the allow path, by policy
//! - `breaker_transitions_total` (counter): state changes by breaker, target state
//! - `breaker_store_errors_total` (counter): store failures by breaker, operation
//! - `breaker_registry_size` (gauge): breakers constructed in this process
//!
//! # Design Decisions
//! - The `metrics` facade is a no-op until a recorder is installed, so
//!   library users and tests pay nothing
//! - Labels are the breaker name and a small fixed vocabulary

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_decision(breaker: &str, allowed: bool) {
    let decision = if allowed { "allowed" } else { "rejected" };
    metrics::counter!(
        "breaker_decisions_total",
        "breaker" => breaker.to_string(),
        "decision" => decision
    )
    .increment(1);
}

pub fn record_degraded(breaker: &str, fail_open: bool) {
    let policy = if fail_open { "fail_open" } else { "fail_closed" };
    metrics::counter!(
        "breaker_degraded_total",
        "breaker" => breaker.to_string(),
        "policy" => policy
    )
    .increment(1);
}

/// `to` is one of `open`, `reopen`, `closed`.
pub fn record_transition(breaker: &str, to: &'static str) {
    metrics::counter!(
        "breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_store_error(breaker: &str, op: &'static str) {
    metrics::counter!(
        "breaker_store_errors_total",
        "breaker" => breaker.to_string(),
        "op" => op
    )
    .increment(1);
}

pub fn record_registry_size(size: usize) {
    metrics::gauge!("breaker_registry_size").set(size as f64);
}
