//! End-to-end analysis over trace files written to a temporary directory
//!
//! Covers study loading (inline and DMS zones), file discovery, decoding with a
//! malformed point and a rejected file, segmentation, aggregation and report output.
use serde_json::{Value, json};
use std::path::Path;

use legwatch::flight_tracker::{Direction, LegKind};
use legwatch::pipeline::{AnalysisOptions, analyze};
use legwatch::report::write_report;
use legwatch::study_config::load_study;
use legwatch::trace_source::{FileTraceSource, TraceSource};

// 2025-02-08T01:00:00Z == 09:00 SGT
const MORNING_BASE: f64 = 1_738_976_400.0;
// 2025-02-07T22:00:00Z == 06:00 SGT, before the window opens
const DAWN_BASE: f64 = 1_738_965_600.0;

const STUDY: &str = r#"
name = "east runway"

[[windows]]
name = "morning"
date = "2025.02.08"
local_start_hour = 9
local_end_hour = 12
utc_offset = "+08:00"
utc_start_hour = 1
utc_end_hour = 4

[[zones]]
name = "airfield"
bounds_file = "airfield.csv"

[[zones]]
name = "approach"
kind = "corridor"
vertices = [[1.30, 103.70], [1.30, 103.90], [1.40, 103.90], [1.40, 103.70]]
heading_from = 45
heading_to = 135
"#;

const AIRFIELD_DMS: &str = "011800N 1035400E\n011800N 1040600E\n012400N 1040600E\n012400N 1035400E\n";

#[allow(clippy::too_many_arguments)]
fn point(
    offset: f64,
    lat: f64,
    lon: f64,
    altitude: Value,
    gs: f64,
    track: Value,
    flags: u64,
    source: &str,
) -> Value {
    json!([offset, lat, lon, altitude, gs, track, flags, null, null, source, null, null, null, null])
}

fn departure(icao: &str, base: f64) -> Value {
    json!({
        "icao": icao,
        "timestamp": base,
        "r": "9V-SMA",
        "t": "A359",
        "trace": [
            point(0.0, 1.35, 103.96, json!("ground"), 5.0, json!(90.0), 0, "adsb_icao"),
            point(20.0, 1.35, 103.97, json!("ground"), 45.0, json!(90.0), 0, "adsb_icao"),
            [25.0, 1.35],
            point(30.0, 1.35, 103.98, json!(50), 140.0, json!(92.0), 2, "adsb_icao"),
            point(60.0, 1.35, 104.02, json!(3000), 170.0, json!(95.0), 0, "adsb_icao"),
            point(120.0, 1.36, 104.20, json!(6000), 220.0, json!(95.0), 0, "adsb_icao")
        ]
    })
}

fn overflight(icao: &str) -> Value {
    json!({
        "icao": icao,
        "timestamp": MORNING_BASE,
        "trace": [
            point(600.0, 1.35, 103.80, json!(5000), 250.0, json!(90.0), 0, "mlat"),
            point(630.0, 1.35, 103.85, json!(5000), 250.0, Value::Null, 0, "mlat"),
            point(660.0, 1.35, 103.95, json!(5000), 250.0, json!(90.0), 0, "adsb_icao"),
            point(690.0, 1.35, 104.05, json!(5000), 250.0, json!(90.0), 0, "adsb_icao"),
            point(720.0, 1.35, 104.15, json!(5000), 250.0, json!(90.0), 0, "adsb_icao")
        ]
    })
}

fn write_fixture(dir: &Path) {
    std::fs::write(dir.join("study.toml"), STUDY).unwrap();
    std::fs::write(dir.join("airfield.csv"), AIRFIELD_DMS).unwrap();

    let traces = dir.join("traces");
    std::fs::create_dir_all(traces.join("63")).unwrap();
    std::fs::write(
        traces.join("63").join("trace_full_76cd63.json"),
        departure("76cd63", MORNING_BASE).to_string(),
    )
    .unwrap();
    std::fs::write(
        traces.join("trace_full_8a01b2.json"),
        overflight("8a01b2").to_string(),
    )
    .unwrap();
    std::fs::write(
        traces.join("trace_full_0badc0.json"),
        json!({"icao": "0badc0", "trace": []}).to_string(),
    )
    .unwrap();
    std::fs::write(
        traces.join("trace_full_e0e0e0.json"),
        departure("e0e0e0", DAWN_BASE).to_string(),
    )
    .unwrap();
}

#[test]
fn test_end_to_end_analysis() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let study = load_study(&dir.path().join("study.toml")).unwrap();
    let source = FileTraceSource::discover(&[dir.path().join("traces")]).unwrap();
    assert_eq!(source.len(), 4);

    let aggregator = analyze(&source, &study, &AnalysisOptions::default()).unwrap();
    let stats = aggregator.stats();
    assert_eq!(stats.traces_processed, 3);
    assert_eq!(stats.traces_rejected, 1);
    assert_eq!(stats.points_dropped, 2);
    assert_eq!(stats.ambiguous_corridor_samples, 1);
    assert_eq!(stats.takeoffs, 2);
    assert!(aggregator.rejected()[0].source.ends_with("trace_full_0badc0.json"));

    let kinds: Vec<(String, String, LegKind)> = aggregator
        .records()
        .keys()
        .map(|k| (k.icao.clone(), k.zone.clone(), k.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("76cd63".to_string(), "airfield".to_string(), LegKind::Departure),
            ("8a01b2".to_string(), "airfield".to_string(), LegKind::Overflight),
            ("8a01b2".to_string(), "approach".to_string(), LegKind::Overflight),
        ]
    );

    let departure_record = aggregator.records().values().next().unwrap();
    let crossing = &departure_record.crossings[0];
    // Index 3 in the file; the malformed point at index 2 is dropped before segmentation
    assert_eq!(crossing.anchor.index, 2);
    assert_eq!(crossing.direction, Direction::E);

    let unique = aggregator.unique_aircraft_by_zone();
    assert_eq!(unique["airfield"], 2);
    assert_eq!(unique["approach"], 1);

    // Only aircraft with a crossing keep their trajectory
    assert_eq!(aggregator.trajectories().len(), 2);
    assert_eq!(aggregator.trajectories()["76cd63"].len(), 5);
}

#[test]
fn test_report_is_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let study = load_study(&dir.path().join("study.toml")).unwrap();
    let source = FileTraceSource::discover(&[dir.path().join("traces")]).unwrap();

    let mut outputs = Vec::new();
    for (run, threads) in [(1, 1), (2, 3)] {
        let options = AnalysisOptions {
            threads: Some(threads),
            keep_trajectories: true,
        };
        let aggregator = analyze(&source, &study, &options).unwrap();
        let out_dir = dir.path().join(format!("out-{}", run));
        let paths = write_report(&aggregator, &study, &out_dir).unwrap();
        outputs.push((
            std::fs::read_to_string(paths.crossings).unwrap(),
            std::fs::read_to_string(paths.trajectories).unwrap(),
        ));
    }

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0].0.lines().count(), 4);
}
