//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_reloads_total` (counter): reloads by `outcome` (applied, partial, retained)
//! - `config_active_log_level` (gauge): 0=debug, 1=info, 2=warn, 3=error
//!
//! Without an installed recorder these calls are no-ops, so library users
//! and tests pay nothing.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::observability::level::LogLevel;

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_reload(outcome: &'static str) {
    ::metrics::counter!("config_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_active_level(level: LogLevel) {
    ::metrics::gauge!("config_active_log_level").set(level as u8 as f64);
}
