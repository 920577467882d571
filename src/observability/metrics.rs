//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sip_resolutions_total` (counter): dispatch outcomes by application
//!   (`matched`, `default`, `unroutable`, `handler_missing`)
//! - `sip_admin_mutations_total` (counter): administrative operations by application
//! - `sip_deployed_applications` (gauge): applications currently deployed

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_resolution(application: &str, outcome: &'static str) {
    metrics::counter!(
        "sip_resolutions_total",
        "application" => application.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_admin_mutation(application: &str, operation: &'static str) {
    metrics::counter!(
        "sip_admin_mutations_total",
        "application" => application.to_string(),
        "operation" => operation
    )
    .increment(1);
}

pub fn set_deployed_applications(count: usize) {
    metrics::gauge!("sip_deployed_applications").set(count as f64);
}
