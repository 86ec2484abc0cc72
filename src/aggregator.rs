//! Accumulates classified leg events into deduplicated crossing records.
//!
//! One aggregator is built per trace on a worker and the partial results are merged
//! (reduce-after-map), so nothing here needs a lock. All collections are ordered maps and
//! crossing lists are kept sorted, which makes the merged result independent of the order
//! in which workers finish.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use crate::flight_tracker::{Direction, LegEvent, LegKind, SampleRef, SegmenterStats};
use crate::trace::{Altitude, PositionSample};

/// Deduplication key for crossing records
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CrossingKey {
    pub icao: String,
    pub zone: String,
    pub window: String,
    pub kind: LegKind,
}

/// One distinct crossing (a leg the segmenter bracketed with its own sample range)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crossing {
    pub direction: Direction,
    pub anchor: SampleRef,
    pub entry: SampleRef,
    pub exit: SampleRef,
    pub source_types: Vec<String>,
    /// Times this exact crossing was reported
    pub observations: u64,
}

impl Crossing {
    fn from_event(event: LegEvent) -> Self {
        Self {
            direction: event.direction,
            anchor: event.anchor,
            entry: event.entry_sample,
            exit: event.exit_sample,
            source_types: event.source_types,
            observations: 1,
        }
    }

    fn identity(&self) -> (DateTime<Utc>, DateTime<Utc>, DateTime<Utc>) {
        (self.entry.time, self.exit.time, self.anchor.time)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrossingRecord {
    /// Distinct crossings ordered by entry time
    pub crossings: Vec<Crossing>,
    /// Re-reports of a crossing already held
    pub duplicate_observations: u64,
}

impl CrossingRecord {
    /// Add a crossing; returns false if it was a re-report of an existing one
    fn add(&mut self, crossing: Crossing) -> bool {
        if let Some(existing) = self
            .crossings
            .iter_mut()
            .find(|c| c.identity() == crossing.identity())
        {
            existing.observations += crossing.observations;
            self.duplicate_observations += crossing.observations;
            return false;
        }

        let position = self
            .crossings
            .partition_point(|c| c.identity() <= crossing.identity());
        self.crossings.insert(position, crossing);
        true
    }

    pub fn observations(&self) -> u64 {
        self.crossings.iter().map(|c| c.observations).sum()
    }
}

/// One point of a reconstructed trajectory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Altitude,
    pub ground_speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
}

impl TrackPoint {
    pub fn from_sample(sample: &PositionSample) -> Self {
        Self {
            time: sample.absolute_time,
            latitude: sample.latitude,
            longitude: sample.longitude,
            altitude: sample.altitude,
            ground_speed_kts: sample.ground_speed_kts,
            heading_deg: sample.heading.degrees(),
        }
    }
}

/// A trace file that was rejected as a whole
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RejectedTrace {
    pub source: String,
    pub reason: String,
}

/// Run-wide counters. Kept as plain fields so reports do not depend on a metrics recorder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub traces_processed: u64,
    pub traces_rejected: u64,
    pub points_decoded: u64,
    pub points_dropped: u64,
    pub metadata_discarded: u64,
    pub header_fields_discarded: u64,
    pub samples_out_of_order: u64,
    pub samples_stale: u64,
    pub leg_boundaries: u64,
    pub spurious_boundaries: u64,
    pub takeoffs: u64,
    pub landings: u64,
    pub ambiguous_corridor_samples: u64,
    pub unclassified_crossings: u64,
    pub events_emitted: u64,
    pub duplicate_crossings: u64,
}

impl RunStats {
    pub fn merge(&mut self, other: &RunStats) {
        self.traces_processed += other.traces_processed;
        self.traces_rejected += other.traces_rejected;
        self.points_decoded += other.points_decoded;
        self.points_dropped += other.points_dropped;
        self.metadata_discarded += other.metadata_discarded;
        self.header_fields_discarded += other.header_fields_discarded;
        self.samples_out_of_order += other.samples_out_of_order;
        self.samples_stale += other.samples_stale;
        self.leg_boundaries += other.leg_boundaries;
        self.spurious_boundaries += other.spurious_boundaries;
        self.takeoffs += other.takeoffs;
        self.landings += other.landings;
        self.ambiguous_corridor_samples += other.ambiguous_corridor_samples;
        self.unclassified_crossings += other.unclassified_crossings;
        self.events_emitted += other.events_emitted;
        self.duplicate_crossings += other.duplicate_crossings;
    }

    pub fn add_segmenter(&mut self, stats: &SegmenterStats) {
        self.samples_out_of_order += stats.out_of_order_samples;
        self.samples_stale += stats.stale_samples;
        self.leg_boundaries += stats.leg_boundaries;
        self.spurious_boundaries += stats.spurious_boundaries;
        self.takeoffs += stats.takeoffs;
        self.landings += stats.landings;
    }
}

#[derive(Debug, Clone, Default)]
pub struct TraceAggregator {
    records: BTreeMap<CrossingKey, CrossingRecord>,
    trajectories: BTreeMap<String, Vec<TrackPoint>>,
    /// Aircraft seen per (zone, window), whether or not a crossing was classified
    presence: BTreeMap<(String, String), BTreeSet<String>>,
    rejected: Vec<RejectedTrace>,
    stats: RunStats,
}

impl TraceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event; returns true if it added a distinct crossing
    pub fn record_event(&mut self, event: LegEvent) -> bool {
        self.stats.events_emitted += 1;
        self.record_presence(&event.icao, &event.zone, &event.window);
        let key = CrossingKey {
            icao: event.icao.clone(),
            zone: event.zone.clone(),
            window: event.window.clone(),
            kind: event.kind,
        };
        let added = self
            .records
            .entry(key)
            .or_default()
            .add(Crossing::from_event(event));
        if !added {
            trace!("Duplicate crossing folded into existing record");
            self.stats.duplicate_crossings += 1;
        }
        added
    }

    pub fn record_events(&mut self, events: impl IntoIterator<Item = LegEvent>) {
        for event in events {
            self.record_event(event);
        }
    }

    /// Note that an aircraft had samples inside a zone during a window
    pub fn record_presence(&mut self, icao: &str, zone: &str, window: &str) {
        self.presence
            .entry((zone.to_string(), window.to_string()))
            .or_default()
            .insert(icao.to_string());
    }

    /// Keep the time-ordered point sequence of an aircraft for trajectory output
    pub fn record_trajectory(&mut self, icao: &str, points: &[PositionSample]) {
        let track = self.trajectories.entry(icao.to_string()).or_default();
        track.extend(points.iter().map(TrackPoint::from_sample));
        normalize_track(track);
    }

    pub fn record_rejected(&mut self, source: &str, reason: &str) {
        self.stats.traces_rejected += 1;
        self.rejected.push(RejectedTrace {
            source: source.to_string(),
            reason: reason.to_string(),
        });
        self.rejected.sort();
    }

    pub fn stats_mut(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn records(&self) -> &BTreeMap<CrossingKey, CrossingRecord> {
        &self.records
    }

    pub fn trajectories(&self) -> &BTreeMap<String, Vec<TrackPoint>> {
        &self.trajectories
    }

    pub fn rejected(&self) -> &[RejectedTrace] {
        &self.rejected
    }

    /// Number of distinct crossings across all records
    pub fn crossing_count(&self) -> usize {
        self.records.values().map(|r| r.crossings.len()).sum()
    }

    /// Distinct crossings per (zone, window, kind)
    pub fn counts_by_zone_window_kind(&self) -> BTreeMap<(String, String, LegKind), u64> {
        let mut counts = BTreeMap::new();
        for (key, record) in &self.records {
            *counts
                .entry((key.zone.clone(), key.window.clone(), key.kind))
                .or_insert(0) += record.crossings.len() as u64;
        }
        counts
    }

    /// Number of distinct aircraft seen inside each zone during any window
    ///
    /// Counts every aircraft with a sample in the zone, including ones that only taxied
    /// or whose crossing could not be classified.
    pub fn unique_aircraft_by_zone(&self) -> BTreeMap<String, usize> {
        let mut aircraft: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for ((zone, _), icaos) in &self.presence {
            aircraft
                .entry(zone)
                .or_default()
                .extend(icaos.iter().map(String::as_str));
        }
        aircraft
            .into_iter()
            .map(|(zone, set)| (zone.to_string(), set.len()))
            .collect()
    }

    /// Number of distinct aircraft seen inside each zone, per window
    pub fn unique_aircraft_by_zone_and_window(&self) -> BTreeMap<(String, String), usize> {
        self.presence
            .iter()
            .map(|(key, icaos)| (key.clone(), icaos.len()))
            .collect()
    }

    /// Fold another partial result into this one
    pub fn merge(&mut self, other: TraceAggregator) {
        for (key, record) in other.records {
            let mine = self.records.entry(key).or_default();
            for crossing in record.crossings {
                let observations = crossing.observations;
                if !mine.add(crossing) {
                    self.stats.duplicate_crossings += observations;
                }
            }
            mine.duplicate_observations += record.duplicate_observations;
        }

        for (icao, points) in other.trajectories {
            let track = self.trajectories.entry(icao).or_default();
            track.extend(points);
            normalize_track(track);
        }

        for (key, icaos) in other.presence {
            self.presence.entry(key).or_default().extend(icaos);
        }

        self.rejected.extend(other.rejected);
        self.rejected.sort();
        self.stats.merge(&other.stats);
    }
}

/// Sort by time and drop repeated timestamps
fn normalize_track(track: &mut Vec<TrackPoint>) {
    track.sort_by(|a, b| a.time.cmp(&b.time));
    track.dedup_by(|a, b| a.time == b.time);
}
