use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use legwatch::analysis_metrics::{initialize_analysis_metrics, write_metrics_snapshot};
use legwatch::pipeline::{AnalysisOptions, analyze};
use legwatch::report::write_report;
use legwatch::study_config::{load_study, study_config_path};
use legwatch::trace_source::{FileTraceSource, TraceSource};

/// Run the full analysis over trace files and write the report
pub fn handle_analyze(
    study: Option<&Path>,
    inputs: &[PathBuf],
    out_dir: &Path,
    threads: Option<usize>,
    skip_trajectories: bool,
    metrics_file: Option<&Path>,
) -> Result<()> {
    let overall_start = Instant::now();

    let handle = match metrics_file {
        Some(_) => Some(legwatch::analysis_metrics::init_metrics()?),
        None => None,
    };
    initialize_analysis_metrics();

    let study_path = study_config_path(study);
    let context = load_study(&study_path)?;
    context.log_summary();

    let source = FileTraceSource::discover(inputs).context("Failed to discover trace files")?;
    if source.is_empty() {
        info!("No trace files found under {:?}", inputs);
    }

    let options = AnalysisOptions {
        threads,
        keep_trajectories: !skip_trajectories,
    };
    let aggregator = analyze(&source, &context, &options)?;

    write_report(&aggregator, &context, out_dir)?;

    for (zone, aircraft) in aggregator.unique_aircraft_by_zone() {
        info!("{} unique aircraft crossed {}", aircraft, zone);
    }

    if let (Some(handle), Some(path)) = (handle.as_ref(), metrics_file) {
        write_metrics_snapshot(handle, path)?;
    }

    info!(
        "Analysis complete in {:.1}s",
        overall_start.elapsed().as_secs_f64()
    );
    Ok(())
}
