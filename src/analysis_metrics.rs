use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use tracing::info;

/// Install the Prometheus recorder
/// Returns a handle that renders the current values in text exposition format
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("pipeline.trace_processing_ms".to_string()),
            &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0],
        )
        .context("Failed to set buckets for pipeline.trace_processing_ms")?
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Initialize analysis metrics to zero so they appear in the snapshot even when nothing
/// went wrong
pub fn initialize_analysis_metrics() {
    // Decoder
    metrics::counter!("trace_decoder.points_decoded_total").absolute(0);
    metrics::counter!("trace_decoder.points_dropped_total").absolute(0);

    // Segmenter
    metrics::counter!("leg_segmenter.out_of_order_samples_total").absolute(0);
    metrics::counter!("leg_segmenter.stale_samples_total").absolute(0);
    metrics::counter!("leg_segmenter.spurious_boundaries_total").absolute(0);
    metrics::counter!("leg_segmenter.ambiguous_corridor_samples_total").absolute(0);
    metrics::counter!("leg_segmenter.events_total").absolute(0);

    // Pipeline
    metrics::counter!("pipeline.traces_processed_total").absolute(0);
    metrics::counter!("pipeline.traces_rejected_total").absolute(0);
    metrics::gauge!("pipeline.worker_threads").set(0.0);
}

/// Write the rendered metrics to a file
pub fn write_metrics_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    let rendered = handle.render();
    std::fs::write(path, rendered)
        .with_context(|| format!("Failed to write metrics snapshot {:?}", path))?;
    info!("Wrote metrics snapshot to {:?}", path);
    Ok(())
}
