//! Turning per-sample zone/window membership plus detected transitions into leg events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::trace;

use super::state_transitions::Transition;
use crate::study_config::StudyContext;
use crate::trace::{Altitude, Heading, PositionSample, Trace};
use crate::zones::ZoneMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Departure,
    Arrival,
    Overflight,
}

impl LegKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegKind::Departure => "departure",
            LegKind::Arrival => "arrival",
            LegKind::Overflight => "overflight",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Direction {
    N,
    E,
    S,
    W,
    Unknown,
}

impl Direction {
    /// 90-degree sectors centred on the cardinal headings; North is [315, 45)
    pub fn from_heading(heading: &Heading) -> Self {
        match heading.degrees() {
            None => Direction::Unknown,
            Some(deg) if !(45.0..315.0).contains(&deg) => Direction::N,
            Some(deg) if deg < 135.0 => Direction::E,
            Some(deg) if deg < 225.0 => Direction::S,
            Some(_) => Direction::W,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::E => "E",
            Direction::S => "S",
            Direction::W => "W",
            Direction::Unknown => "Unknown",
        }
    }
}

/// The parts of a sample an event needs to point back at
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleRef {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Altitude,
}

impl SampleRef {
    pub fn new(index: usize, sample: &PositionSample) -> Self {
        Self {
            index,
            time: sample.absolute_time,
            latitude: sample.latitude,
            longitude: sample.longitude,
            altitude: sample.altitude,
        }
    }
}

/// One classified zone crossing. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegEvent {
    pub icao: String,
    pub zone: String,
    pub window: String,
    pub kind: LegKind,
    pub direction: Direction,
    /// The transition sample for departures/arrivals, the entry sample for overflights
    pub anchor: SampleRef,
    pub entry_sample: SampleRef,
    pub exit_sample: SampleRef,
    /// Message sources seen during the crossing, for provenance only
    pub source_types: Vec<String>,
}

/// Events found in one trace plus the number of ambiguous corridor samples seen
#[derive(Debug, Clone, Default)]
pub struct CrossingScan {
    pub events: Vec<LegEvent>,
    pub ambiguous_corridor_samples: u64,
    /// Crossings that were neither bracketed by a transition nor airborne throughout
    pub unclassified_crossings: u64,
    /// Every (zone, window) the aircraft was seen in, classified or not
    pub presence: BTreeSet<(String, String)>,
}

/// Find every (zone, window) crossing in a trace and classify it
///
/// A crossing is a maximal run of consecutive samples that are inside the zone and the
/// window. Each takeoff/landing inside the run yields a departure/arrival; a run with
/// no transition whose known altitudes are all above zero is an overflight.
pub fn scan_crossings(
    trace: &Trace,
    transitions: &[(usize, Transition)],
    study: &StudyContext,
) -> CrossingScan {
    let mut scan = CrossingScan::default();

    let window_membership: Vec<Vec<bool>> = study
        .windows
        .iter()
        .map(|w| trace.points.iter().map(|s| w.matches(s)).collect())
        .collect();

    for zone in study.zones.zones() {
        let zone_membership: Vec<bool> = trace
            .points
            .iter()
            .map(|s| match zone.test(s) {
                ZoneMatch::Inside => true,
                ZoneMatch::Outside => false,
                ZoneMatch::Ambiguous => {
                    scan.ambiguous_corridor_samples += 1;
                    study.count_ambiguous_corridors
                }
            })
            .collect();

        for (window, in_window) in study.windows.iter().zip(&window_membership) {
            let inside = |i: usize| zone_membership[i] && in_window[i];
            let mut i = 0;
            while i < trace.points.len() {
                if !inside(i) {
                    i += 1;
                    continue;
                }
                let entry = i;
                while i + 1 < trace.points.len() && inside(i + 1) {
                    i += 1;
                }
                let exit = i;
                i += 1;
                scan.presence.insert((zone.name().to_string(), window.name.clone()));

                let crossing = Crossing {
                    trace,
                    zone: zone.name(),
                    window: &window.name,
                    entry,
                    exit,
                };
                if !crossing.classify(transitions, &mut scan.events) {
                    trace!(
                        "Unclassified crossing of {} in {} samples {}..={}",
                        zone.name(),
                        window.name,
                        entry,
                        exit
                    );
                    scan.unclassified_crossings += 1;
                }
            }
        }
    }

    scan
}

struct Crossing<'a> {
    trace: &'a Trace,
    zone: &'a str,
    window: &'a str,
    entry: usize,
    exit: usize,
}

impl Crossing<'_> {
    /// Push the events for this crossing; false if it produced none
    fn classify(&self, transitions: &[(usize, Transition)], events: &mut Vec<LegEvent>) -> bool {
        let mut produced = false;
        for &(index, transition) in transitions
            .iter()
            .filter(|(index, _)| (self.entry..=self.exit).contains(index))
        {
            let kind = match transition {
                Transition::Takeoff => LegKind::Departure,
                Transition::Landing => LegKind::Arrival,
            };
            events.push(self.event(kind, index));
            produced = true;
        }

        if !produced && self.is_overflight() {
            events.push(self.event(LegKind::Overflight, self.entry));
            produced = true;
        }
        produced
    }

    /// Every known altitude is above zero, and at least one is known
    fn is_overflight(&self) -> bool {
        let mut known = 0;
        for sample in &self.trace.points[self.entry..=self.exit] {
            match sample.altitude {
                Altitude::Barometric(ft) if ft > 0 => known += 1,
                Altitude::Barometric(_) | Altitude::OnGround => return false,
                Altitude::Unknown => {}
            }
        }
        known > 0
    }

    fn event(&self, kind: LegKind, anchor: usize) -> LegEvent {
        let points = &self.trace.points;
        let source_types: BTreeSet<String> = points[self.entry..=self.exit]
            .iter()
            .filter_map(|s| s.source_type.as_ref())
            .map(|t| t.as_str().to_string())
            .collect();

        LegEvent {
            icao: self.trace.icao.clone(),
            zone: self.zone.to_string(),
            window: self.window.to_string(),
            kind,
            direction: Direction::from_heading(&points[anchor].heading),
            anchor: SampleRef::new(anchor, &points[anchor]),
            entry_sample: SampleRef::new(self.entry, &points[self.entry]),
            exit_sample: SampleRef::new(self.exit, &points[self.exit]),
            source_types: source_types.into_iter().collect(),
        }
    }
}
