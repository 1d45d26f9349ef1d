//! Metrics collection and Prometheus export.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls are no-ops, so tests that
/// build several applications in one process can all call it.
pub fn init_metrics() -> Result<(), BuildError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    if METRICS_HANDLE.set(handle).is_err() {
        tracing::debug!("Metrics recorder already initialized");
    }
    Ok(())
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_agent_run(model: &str, success: bool, seconds: f64) {
    let labels = [
        ("model", model.to_string()),
        ("outcome", outcome(success).to_string()),
    ];
    metrics::counter!("agent_runs_total", &labels).increment(1);
    metrics::histogram!("agent_run_duration_seconds", &labels).record(seconds);
}

pub fn record_image_generation(success: bool, steps: u32, seconds: f64) {
    let labels = [("outcome", outcome(success).to_string())];
    metrics::counter!("image_generations_total", &labels).increment(1);
    metrics::counter!("image_generation_steps_total").increment(u64::from(steps));
    metrics::histogram!("image_generation_duration_seconds", &labels).record(seconds);
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}
