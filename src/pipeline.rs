//! Parallel run driver: decode, segment and aggregate every trace in a source.
//!
//! Each trace is handled independently on a rayon worker into its own `TraceAggregator`;
//! the partial aggregators are then merged. A rejected file never affects its siblings.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{info, info_span, warn};

use crate::aggregator::TraceAggregator;
use crate::flight_tracker::segment_trace;
use crate::study_config::StudyContext;
use crate::trace::{DecodedTrace, decode_trace_json};
use crate::trace_source::TraceSource;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Worker threads; `None` lets rayon pick one per core
    pub threads: Option<usize>,
    /// Keep the point sequence of every aircraft that produced at least one event
    pub keep_trajectories: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            threads: None,
            keep_trajectories: true,
        }
    }
}

/// Run the whole analysis over a source on a dedicated thread pool
pub fn analyze<S>(
    source: &S,
    study: &StudyContext,
    options: &AnalysisOptions,
) -> Result<TraceAggregator>
where
    S: TraceSource + ?Sized,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.unwrap_or(0))
        .thread_name(|i| format!("legwatch-worker-{}", i))
        .build()
        .context("Failed to build worker thread pool")?;
    metrics::gauge!("pipeline.worker_threads").set(pool.current_num_threads() as f64);

    info!(
        "Analyzing {} traces on {} threads",
        source.len(),
        pool.current_num_threads()
    );
    let start = Instant::now();

    let aggregator = pool.install(|| {
        (0..source.len())
            .into_par_iter()
            .map(|index| process_document(source, index, study, options))
            .reduce(TraceAggregator::new, |mut acc, partial| {
                acc.merge(partial);
                acc
            })
    });

    let stats = aggregator.stats();
    info!(
        "Processed {} traces ({} rejected) in {:.1}s: {} distinct crossings, {} dropped points",
        stats.traces_processed,
        stats.traces_rejected,
        start.elapsed().as_secs_f64(),
        aggregator.crossing_count(),
        stats.points_dropped
    );
    Ok(aggregator)
}

/// Load, decode and analyze one document of a source
pub fn process_document<S>(
    source: &S,
    index: usize,
    study: &StudyContext,
    options: &AnalysisOptions,
) -> TraceAggregator
where
    S: TraceSource + ?Sized,
{
    let label = source.label(index);
    let mut aggregator = TraceAggregator::new();

    let decoded = source
        .load(index)
        .and_then(|json| decode_trace_json(&json).with_context(|| format!("Rejected {}", label)));

    match decoded {
        Ok(decoded) => process_trace(decoded, study, options, &mut aggregator),
        Err(e) => {
            warn!("Skipping {}: {:#}", label, e);
            metrics::counter!("pipeline.traces_rejected_total").increment(1);
            aggregator.record_rejected(&label, &format!("{:#}", e));
        }
    }
    aggregator
}

/// Segment one decoded trace and record its events into `aggregator`
pub fn process_trace(
    decoded: DecodedTrace,
    study: &StudyContext,
    options: &AnalysisOptions,
    aggregator: &mut TraceAggregator,
) {
    let start = Instant::now();
    let DecodedTrace {
        trace,
        dropped_points,
        metadata_discarded,
        header_fields_discarded,
        ..
    } = decoded;
    let span = info_span!("trace", icao = %trace.icao);
    let _guard = span.enter();

    let segmentation = segment_trace(&trace, study);

    let stats = aggregator.stats_mut();
    stats.traces_processed += 1;
    stats.points_decoded += trace.points.len() as u64;
    stats.points_dropped += dropped_points as u64;
    stats.metadata_discarded += metadata_discarded as u64;
    stats.header_fields_discarded += header_fields_discarded as u64;
    stats.add_segmenter(&segmentation.stats);
    stats.ambiguous_corridor_samples += segmentation.ambiguous_corridor_samples;
    stats.unclassified_crossings += segmentation.unclassified_crossings;

    if options.keep_trajectories && !segmentation.events.is_empty() {
        aggregator.record_trajectory(&trace.icao, &trace.points);
    }
    for (zone, window) in &segmentation.presence {
        aggregator.record_presence(&trace.icao, zone, window);
    }
    aggregator.record_events(segmentation.events);

    metrics::counter!("pipeline.traces_processed_total").increment(1);
    metrics::histogram!("pipeline.trace_processing_ms")
        .record(start.elapsed().as_micros() as f64 / 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight_tracker::SegmenterConfig;
    use crate::trace_source::MemoryTraceSource;
    use crate::windows::{ObservationWindow, parse_utc_offset};
    use crate::zones::{Zone, ZoneIndex};
    use chrono::NaiveDate;
    use serde_json::json;

    fn study() -> StudyContext {
        let zone = Zone::polygon(
            "airfield",
            &[(1.30, 103.90), (1.30, 104.10), (1.40, 104.10), (1.40, 103.90)],
        )
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 2, 8).unwrap();
        let window =
            ObservationWindow::new("morning", date, 9, 12, parse_utc_offset("+08:00").unwrap())
                .unwrap();
        StudyContext::new(
            ZoneIndex::new(vec![zone]).unwrap(),
            vec![window],
            SegmenterConfig::default(),
        )
        .unwrap()
    }

    fn overflight(icao: &str) -> String {
        json!({
            "icao": icao,
            "timestamp": 1_738_976_400.0,
            "trace": [
                [0.0, 1.35, 103.95, 5000, 250.0, 90.0, 0, 0, null, "adsb_icao", null, null, null, null],
                [30.0, 1.35, 104.00, 5000, 250.0, 90.0, 0, 0, null, "mlat", null, null, null, null]
            ]
        })
        .to_string()
    }

    #[test]
    fn test_bad_file_does_not_affect_siblings() {
        let mut source = MemoryTraceSource::new();
        source.push("a", overflight("aaaaaa"));
        source.push("broken", "{\"timestamp\": 1.0, \"trace\": []}");
        source.push("b", overflight("bbbbbb"));

        let options = AnalysisOptions {
            threads: Some(2),
            keep_trajectories: true,
        };
        let aggregator = analyze(&source, &study(), &options).unwrap();

        assert_eq!(aggregator.stats().traces_processed, 2);
        assert_eq!(aggregator.stats().traces_rejected, 1);
        assert_eq!(aggregator.rejected()[0].source, "broken");
        assert!(aggregator.rejected()[0].reason.contains("icao"));
        assert_eq!(aggregator.crossing_count(), 2);
        assert_eq!(aggregator.trajectories().len(), 2);

        let crossing = &aggregator.records().values().next().unwrap().crossings[0];
        assert_eq!(crossing.source_types, vec!["adsb_icao", "mlat"]);
    }

    #[test]
    fn test_taxiing_aircraft_counted_in_zone() {
        let taxiing = json!({
            "icao": "c0ffee",
            "timestamp": 1_738_976_400.0,
            "trace": [
                [0.0, 1.35, 103.98, "ground", 8.0, 90.0, 0, null, null, "adsb_icao", null, null, null, null],
                [60.0, 1.35, 103.99, "ground", 12.0, 90.0, 0, null, null, "adsb_icao", null, null, null, null]
            ]
        })
        .to_string();
        let mut source = MemoryTraceSource::new();
        source.push("a", overflight("aaaaaa"));
        source.push("tug", taxiing);

        let options = AnalysisOptions {
            threads: Some(2),
            keep_trajectories: false,
        };
        let aggregator = analyze(&source, &study(), &options).unwrap();

        assert_eq!(aggregator.crossing_count(), 1);
        assert_eq!(aggregator.stats().unclassified_crossings, 1);
        assert_eq!(aggregator.unique_aircraft_by_zone()["airfield"], 2);
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let mut source = MemoryTraceSource::new();
        for i in 0..8 {
            source.push(&format!("t{}", i), overflight(&format!("abc{:03}", i)));
        }
        let study = study();
        let with_threads = |threads| AnalysisOptions {
            threads: Some(threads),
            keep_trajectories: true,
        };
        let one = analyze(&source, &study, &with_threads(1)).unwrap();
        let four = analyze(&source, &study, &with_threads(4)).unwrap();
        assert_eq!(one.records(), four.records());
        assert_eq!(one.stats(), four.stats());
        assert_eq!(one.trajectories(), four.trajectories());
    }
}
