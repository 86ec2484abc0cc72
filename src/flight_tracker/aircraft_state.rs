use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use super::state_transitions::{GroundBasis, GroundState};
use crate::trace::{Altitude, PositionSample};

/// Number of evaluated samples kept per aircraft
const RECENT_SAMPLE_CAPACITY: usize = 10;

/// Compact sample data for in-memory state tracking
/// Only the fields needed for ground/air decisions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompactSample {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub altitude: Altitude,
    pub ground_speed_kts: Option<f64>,
}

impl CompactSample {
    pub fn from_sample(index: usize, sample: &PositionSample) -> Self {
        Self {
            index,
            timestamp: sample.absolute_time,
            altitude: sample.altitude,
            ground_speed_kts: sample.ground_speed_kts,
        }
    }
}

/// Segmentation state for one aircraft while its trace is being walked
#[derive(Debug, Clone)]
pub struct AircraftState {
    pub icao: String,
    pub ground_state: GroundState,
    /// Only meaningful while `ground_state` is `OnGround`
    pub ground_basis: GroundBasis,

    /// Recent evaluated samples (oldest first). Stale and out-of-order samples never land here.
    pub recent_samples: VecDeque<CompactSample>,

    /// Highest offset seen so far, for out-of-order detection
    pub last_offset_seconds: Option<f64>,

    /// A `new_leg` flag arrived on a stale sample; re-evaluate at the next usable one
    pub pending_boundary: bool,
}

impl AircraftState {
    pub fn new(icao: &str) -> Self {
        Self {
            icao: icao.to_string(),
            ground_state: GroundState::Unknown,
            ground_basis: GroundBasis::default(),
            recent_samples: VecDeque::with_capacity(RECENT_SAMPLE_CAPACITY),
            last_offset_seconds: None,
            pending_boundary: false,
        }
    }

    pub fn add_sample(&mut self, index: usize, sample: &PositionSample) {
        if self.recent_samples.len() >= RECENT_SAMPLE_CAPACITY {
            self.recent_samples.pop_front();
        }
        self.recent_samples
            .push_back(CompactSample::from_sample(index, sample));
    }

    pub fn last_sample(&self) -> Option<&CompactSample> {
        self.recent_samples.back()
    }

    /// Ground speed of the most recent evaluated sample that reported one
    pub fn previous_ground_speed(&self) -> Option<f64> {
        self.recent_samples
            .iter()
            .rev()
            .find_map(|s| s.ground_speed_kts)
    }

    /// Returns true if `offset_seconds` goes backwards; otherwise records it
    pub fn check_out_of_order(&mut self, offset_seconds: f64) -> bool {
        match self.last_offset_seconds {
            Some(last) if offset_seconds < last => true,
            _ => {
                self.last_offset_seconds = Some(offset_seconds);
                false
            }
        }
    }

    /// Estimate a climb rate for `sample` from recent barometric altitudes
    /// Uses the oldest sample with a barometric altitude within `window_secs`
    pub fn estimate_climb_rate(&self, sample: &PositionSample, window_secs: i64) -> Option<i32> {
        let current_ft = sample.altitude.feet()?;

        let oldest = self.recent_samples.iter().find(|s| {
            let age = sample.absolute_time.signed_duration_since(s.timestamp);
            age.num_seconds() <= window_secs && s.altitude.feet().is_some()
        })?;

        let elapsed_ms = sample
            .absolute_time
            .signed_duration_since(oldest.timestamp)
            .num_milliseconds();
        if elapsed_ms <= 0 {
            return None;
        }

        let delta_ft = f64::from(current_ft - oldest.altitude.feet()?);
        Some((delta_ft * 60_000.0 / elapsed_ms as f64).round() as i32)
    }
}
