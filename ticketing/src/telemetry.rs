//! Tracing subscriber and Prometheus exporter setup.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Latency buckets for `*_duration_seconds` histograms
const DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];

/// Telemetry setup failures
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber is already installed
    #[error("Tracing subscriber already initialized: {0}")]
    Tracing(String),

    /// Bad exporter address
    #[error("Invalid metrics address '{0}'")]
    Address(String),

    /// Exporter could not be built or bound
    #[error("Failed to install Prometheus exporter: {0}")]
    Exporter(String),
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` is used when it is unset or invalid.
///
/// # Errors
///
/// Returns [`TelemetryError::Tracing`] if a subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| TelemetryError::Tracing(e.to_string()))
}

/// Serve `/metrics` on `address` and register the business metric descriptions.
///
/// Must be called from inside a Tokio runtime.
///
/// # Errors
///
/// Returns [`TelemetryError`] if the address does not parse or the exporter cannot bind.
pub fn install_metrics_exporter(address: &str) -> Result<SocketAddr, TelemetryError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| TelemetryError::Address(address.to_string()))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), DURATION_BUCKETS)
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?
        .install()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    crate::metrics::register_business_metrics();
    tracing::info!(%addr, "Metrics available at http://{addr}/metrics");
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_metrics_address_is_rejected_before_binding() {
        let result = install_metrics_exporter("not an address");
        assert!(matches!(result, Err(TelemetryError::Address(a)) if a == "not an address"));
    }
}
