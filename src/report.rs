//! Output files for downstream reporting and plotting.
//!
//! - `crossings.csv`: one row per distinct crossing
//! - `trajectories.csv`: ordered track points of every aircraft with a crossing
//! - `summary.json`: run counters, per zone/window/kind counts and unique aircraft

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::Writer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::aggregator::{RejectedTrace, RunStats, TraceAggregator};
use crate::flight_tracker::{Direction, LegKind};
use crate::study_config::StudyContext;
use crate::trace::Altitude;

pub const CROSSINGS_FILE: &str = "crossings.csv";
pub const TRAJECTORIES_FILE: &str = "trajectories.csv";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Serialize)]
struct CrossingRow<'a> {
    icao: &'a str,
    zone: &'a str,
    window: &'a str,
    kind: LegKind,
    direction: Direction,
    anchor_time: DateTime<Utc>,
    anchor_latitude: f64,
    anchor_longitude: f64,
    anchor_altitude: Altitude,
    entry_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
    entry_index: usize,
    exit_index: usize,
    observations: u64,
    source_types: String,
}

#[derive(Debug, Serialize)]
struct TrajectoryRow<'a> {
    icao: &'a str,
    time: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    altitude: Altitude,
    ground_speed_kts: Option<f64>,
    heading_deg: Option<f64>,
}

#[derive(Debug, Serialize)]
struct WindowSummary<'a> {
    name: &'a str,
    date: String,
    local_start_hour: u32,
    local_end_hour: u32,
    utc_offset: String,
    utc_start: DateTime<Utc>,
    utc_end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct CountRow {
    zone: String,
    window: String,
    kind: LegKind,
    crossings: u64,
}

#[derive(Debug, Serialize)]
struct ZoneWindowAircraft {
    zone: String,
    window: String,
    aircraft: usize,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    study: Option<&'a str>,
    generated_at: DateTime<Utc>,
    stats: &'a RunStats,
    distinct_crossings: usize,
    windows: Vec<WindowSummary<'a>>,
    counts: Vec<CountRow>,
    unique_aircraft_by_zone: BTreeMap<String, usize>,
    unique_aircraft_by_zone_and_window: Vec<ZoneWindowAircraft>,
    rejected: &'a [RejectedTrace],
}

/// Paths of the files written by `write_report`
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub crossings: PathBuf,
    pub trajectories: PathBuf,
    pub summary: PathBuf,
}

/// Write all report files into `out_dir`, creating it if needed
pub fn write_report(
    aggregator: &TraceAggregator,
    study: &StudyContext,
    out_dir: &Path,
) -> Result<ReportPaths> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {:?}", out_dir))?;

    let paths = ReportPaths {
        crossings: out_dir.join(CROSSINGS_FILE),
        trajectories: out_dir.join(TRAJECTORIES_FILE),
        summary: out_dir.join(SUMMARY_FILE),
    };
    write_crossings_csv(aggregator, &paths.crossings)?;
    write_trajectories_csv(aggregator, &paths.trajectories)?;
    write_summary_json(aggregator, study, &paths.summary)?;

    info!("Wrote report to {:?}", out_dir);
    Ok(paths)
}

pub fn write_crossings_csv(aggregator: &TraceAggregator, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = Writer::from_writer(BufWriter::new(file));

    let mut rows = 0;
    for (key, record) in aggregator.records() {
        for crossing in &record.crossings {
            writer.serialize(CrossingRow {
                icao: &key.icao,
                zone: &key.zone,
                window: &key.window,
                kind: key.kind,
                direction: crossing.direction,
                anchor_time: crossing.anchor.time,
                anchor_latitude: crossing.anchor.latitude,
                anchor_longitude: crossing.anchor.longitude,
                anchor_altitude: crossing.anchor.altitude,
                entry_time: crossing.entry.time,
                exit_time: crossing.exit.time,
                entry_index: crossing.entry.index,
                exit_index: crossing.exit.index,
                observations: crossing.observations,
                source_types: crossing.source_types.join(";"),
            })?;
            rows += 1;
        }
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {:?}", path))?;

    info!("Wrote {} crossings to {:?}", rows, path);
    Ok(())
}

pub fn write_trajectories_csv(aggregator: &TraceAggregator, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = Writer::from_writer(BufWriter::new(file));

    for (icao, points) in aggregator.trajectories() {
        for point in points {
            writer.serialize(TrajectoryRow {
                icao,
                time: point.time,
                latitude: point.latitude,
                longitude: point.longitude,
                altitude: point.altitude,
                ground_speed_kts: point.ground_speed_kts,
                heading_deg: point.heading_deg,
            })?;
        }
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {:?}", path))?;
    Ok(())
}

pub fn write_summary_json(
    aggregator: &TraceAggregator,
    study: &StudyContext,
    path: &Path,
) -> Result<()> {
    let windows = study
        .windows
        .iter()
        .map(|w| {
            let (utc_start, utc_end) = w.utc_range();
            WindowSummary {
                name: &w.name,
                date: w.date.to_string(),
                local_start_hour: w.local_start_hour,
                local_end_hour: w.local_end_hour,
                utc_offset: w.utc_offset.to_string(),
                utc_start,
                utc_end,
            }
        })
        .collect();

    let counts = aggregator
        .counts_by_zone_window_kind()
        .into_iter()
        .map(|((zone, window, kind), crossings)| CountRow {
            zone,
            window,
            kind,
            crossings,
        })
        .collect();

    let unique_aircraft_by_zone_and_window = aggregator
        .unique_aircraft_by_zone_and_window()
        .into_iter()
        .map(|((zone, window), aircraft)| ZoneWindowAircraft {
            zone,
            window,
            aircraft,
        })
        .collect();

    let summary = Summary {
        study: study.name.as_deref(),
        generated_at: Utc::now(),
        stats: aggregator.stats(),
        distinct_crossings: aggregator.crossing_count(),
        windows,
        counts,
        unique_aircraft_by_zone: aggregator.unique_aircraft_by_zone(),
        unique_aircraft_by_zone_and_window,
        rejected: aggregator.rejected(),
    };

    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &summary)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
