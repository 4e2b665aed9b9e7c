use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the process-wide Prometheus recorder.
///
/// Every `metrics::counter!`/`histogram!` call after this lands in the
/// returned handle; render it from the `/metrics` route.
pub fn init_metrics() -> Result<PrometheusHandle, anyhow::Error> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))
}
