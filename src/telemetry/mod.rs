//! Telemetry module
//!
//! Structured logging and Prometheus metrics

mod logging;
mod metrics;

pub use logging::init_logging;
pub use metrics::{
    describe_metrics, record_cycle_latency, record_order, record_skip, set_gauge, GaugeMetric,
};

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::config::TelemetryConfig;

/// Guard returned once telemetry is initialized
pub struct TelemetryGuard {
    metrics_addr: Option<SocketAddr>,
}

impl TelemetryGuard {
    /// Address of the Prometheus endpoint, when enabled
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }
}

/// Initialize logging and, with a non-zero `metrics_port`, the Prometheus
/// exporter. Must run inside a Tokio runtime.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format)?;

    let metrics_addr = if config.metrics_port == 0 {
        None
    } else {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
        describe_metrics();
        tracing::info!(%addr, "Prometheus exporter listening");
        Some(addr)
    };

    Ok(TelemetryGuard { metrics_addr })
}
