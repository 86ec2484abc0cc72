//! Leg segmentation: a per-aircraft ground/air state machine over one trace, and the
//! crossing classifier that turns its transitions into departure, arrival and overflight
//! events.

mod aircraft_state;
mod crossings;
mod state_transitions;

pub use aircraft_state::{AircraftState, CompactSample};
pub use crossings::{CrossingScan, Direction, LegEvent, LegKind, SampleRef, scan_crossings};
pub use state_transitions::{GroundBasis, GroundState, SegmenterConfig, Transition};

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, trace, warn};

use crate::study_config::StudyContext;
use crate::trace::{PositionSample, Trace};
use state_transitions::{Kinematics, classify, evaluate};

/// Data-quality and classification counters for one trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmenterStats {
    pub samples_evaluated: u64,
    pub out_of_order_samples: u64,
    pub stale_samples: u64,
    /// Samples where a `new_leg` flag (possibly deferred from a stale sample) was honoured
    pub leg_boundaries: u64,
    /// Boundaries where the kinematic rules found neither a takeoff nor a landing
    pub spurious_boundaries: u64,
    pub takeoffs: u64,
    pub landings: u64,
}

/// Walks one aircraft's samples in trace order and reports takeoffs and landings
pub struct LegSegmenter<'a> {
    config: &'a SegmenterConfig,
    state: AircraftState,
    stats: SegmenterStats,
}

impl<'a> LegSegmenter<'a> {
    pub fn new(icao: &str, config: &'a SegmenterConfig) -> Self {
        Self {
            config,
            state: AircraftState::new(icao),
            stats: SegmenterStats::default(),
        }
    }

    pub fn ground_state(&self) -> GroundState {
        self.state.ground_state
    }

    pub fn stats(&self) -> &SegmenterStats {
        &self.stats
    }

    /// Feed the next sample of the trace
    ///
    /// Out-of-order samples are logged and skipped. Stale samples never trigger a
    /// transition, but a `new_leg` flag on one is carried to the next usable sample.
    pub fn observe(&mut self, index: usize, sample: &PositionSample) -> Option<Transition> {
        if self.state.check_out_of_order(sample.offset_seconds) {
            warn!(
                "Out-of-order sample {} for {}: offset {:.1}s is before {:.1}s",
                index,
                self.state.icao,
                sample.offset_seconds,
                self.state.last_offset_seconds.unwrap_or_default()
            );
            self.stats.out_of_order_samples += 1;
            return None;
        }

        if sample.flags.stale {
            self.stats.stale_samples += 1;
            if sample.flags.new_leg {
                trace!("Deferring new_leg on stale sample {} for {}", index, self.state.icao);
                self.state.pending_boundary = true;
            }
            return None;
        }

        self.stats.samples_evaluated += 1;
        let deferred = std::mem::take(&mut self.state.pending_boundary);
        let boundary = sample.flags.new_leg || deferred;

        let estimated_climb_rate = if sample.effective_vertical_rate().is_none() {
            self.state
                .estimate_climb_rate(sample, self.config.climb_rate_window_secs)
        } else {
            None
        };
        let kinematics = Kinematics::new(
            sample,
            self.state.previous_ground_speed(),
            estimated_climb_rate,
        );

        let (next_state, transition) = evaluate(
            self.config,
            self.state.ground_state,
            self.state.ground_basis,
            &kinematics,
        );
        self.state.ground_state = next_state;

        if boundary {
            self.stats.leg_boundaries += 1;
            if transition.is_none() {
                // Start the new leg from what this sample says on its own
                self.stats.spurious_boundaries += 1;
                self.state.ground_state =
                    classify(self.config, &kinematics).unwrap_or(GroundState::Unknown);
                debug!(
                    "Leg boundary at sample {} for {} without takeoff or landing, now {:?}",
                    index, self.state.icao, self.state.ground_state
                );
            }
        }

        if self.state.ground_state == GroundState::OnGround {
            self.state.ground_basis = self.state.ground_basis.after(sample.altitude);
        }

        match transition {
            Some(Transition::Takeoff) => self.stats.takeoffs += 1,
            Some(Transition::Landing) => self.stats.landings += 1,
            None => {}
        }

        self.state.add_sample(index, sample);
        transition
    }
}

/// Everything segmentation learned about one trace
#[derive(Debug, Clone, Default)]
pub struct TraceSegmentation {
    /// `(sample index, transition)` in trace order
    pub transitions: Vec<(usize, Transition)>,
    pub events: Vec<LegEvent>,
    pub stats: SegmenterStats,
    pub ambiguous_corridor_samples: u64,
    pub unclassified_crossings: u64,
    /// (zone, window) pairs with at least one sample of this aircraft
    pub presence: BTreeSet<(String, String)>,
}

/// Segment a whole trace and classify its zone crossings
pub fn segment_trace(trace: &Trace, study: &StudyContext) -> TraceSegmentation {
    let mut segmenter = LegSegmenter::new(&trace.icao, &study.segmenter);
    let transitions: Vec<(usize, Transition)> = trace
        .points
        .iter()
        .enumerate()
        .filter_map(|(i, sample)| segmenter.observe(i, sample).map(|t| (i, t)))
        .collect();
    let stats = *segmenter.stats();

    let scan = scan_crossings(trace, &transitions, study);

    metrics::counter!("leg_segmenter.out_of_order_samples_total")
        .increment(stats.out_of_order_samples);
    metrics::counter!("leg_segmenter.stale_samples_total").increment(stats.stale_samples);
    metrics::counter!("leg_segmenter.spurious_boundaries_total")
        .increment(stats.spurious_boundaries);
    metrics::counter!("leg_segmenter.ambiguous_corridor_samples_total")
        .increment(scan.ambiguous_corridor_samples);
    metrics::counter!("leg_segmenter.events_total").increment(scan.events.len() as u64);

    debug!(
        "{}: {} transitions, {} events, {} out-of-order, {} stale",
        trace.icao,
        transitions.len(),
        scan.events.len(),
        stats.out_of_order_samples,
        stats.stale_samples
    );

    TraceSegmentation {
        transitions,
        events: scan.events,
        stats,
        ambiguous_corridor_samples: scan.ambiguous_corridor_samples,
        unclassified_crossings: scan.unclassified_crossings,
        presence: scan.presence,
    }
}
