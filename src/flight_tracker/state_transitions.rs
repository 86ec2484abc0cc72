use serde::{Deserialize, Serialize};

use crate::trace::{Altitude, PositionSample};

/// Kinematic thresholds used to bracket takeoffs and landings
///
/// These are tunable defaults, not a contract; the study file may override any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Ground speed above which a climb-out counts as a takeoff (knots, exclusive)
    pub takeoff_speed_kts: f64,
    /// Vertical rate at or above which a climb-out counts as a takeoff (fpm)
    pub takeoff_vertical_rate_fpm: i32,
    /// Barometric altitudes at or below this are "near zero" (feet)
    pub near_ground_altitude_ft: i32,
    /// Vertical rate at or below which a near-zero sample counts as touchdown (fpm)
    pub landing_vertical_rate_fpm: i32,
    /// Window used to estimate a climb rate when no vertical rate was reported (seconds)
    pub climb_rate_window_secs: i64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            takeoff_speed_kts: 35.0,
            takeoff_vertical_rate_fpm: 500,
            near_ground_altitude_ft: 100,
            landing_vertical_rate_fpm: 200,
            climb_rate_window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundState {
    /// Before any sample has established ground/air status
    Unknown,
    OnGround,
    Airborne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Takeoff,
    Landing,
}

/// What the ground state rests on, which decides how much evidence a takeoff needs
///
/// readsb keeps sending barometric altitudes near zero through a landing rollout, so a
/// ground state entered that way cannot be left on speed alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundBasis {
    /// The last altitude seen on the ground was an explicit `"ground"` report
    #[default]
    Reported,
    /// The last altitude seen on the ground was a near-zero barometric reading
    Barometric,
}

impl GroundBasis {
    /// Basis after a sample that leaves (or keeps) the aircraft on the ground
    pub(crate) fn after(self, altitude: Altitude) -> Self {
        match altitude {
            Altitude::OnGround => GroundBasis::Reported,
            Altitude::Barometric(_) => GroundBasis::Barometric,
            Altitude::Unknown => self,
        }
    }
}

/// Kinematic view of one sample, with fallbacks already applied
#[derive(Debug, Clone, Copy)]
pub(crate) struct Kinematics {
    pub altitude: Altitude,
    pub ground_speed_kts: Option<f64>,
    pub previous_ground_speed_kts: Option<f64>,
    pub vertical_rate_fpm: Option<i32>,
}

impl Kinematics {
    pub fn new(
        sample: &PositionSample,
        previous_ground_speed_kts: Option<f64>,
        estimated_climb_rate: Option<i32>,
    ) -> Self {
        Self {
            altitude: sample.altitude,
            ground_speed_kts: sample.ground_speed_kts,
            previous_ground_speed_kts,
            vertical_rate_fpm: sample.effective_vertical_rate().or(estimated_climb_rate),
        }
    }

    /// Current ground speed, falling back to the previous sample's
    fn speed(&self) -> Option<f64> {
        self.ground_speed_kts.or(self.previous_ground_speed_kts)
    }
}

/// Establish ground/air status from a single sample, with no history
///
/// `None` when the altitude is unknown: the state stays undetermined rather than guessing.
pub(crate) fn classify(config: &SegmenterConfig, k: &Kinematics) -> Option<GroundState> {
    match k.altitude {
        Altitude::OnGround => Some(GroundState::OnGround),
        Altitude::Unknown => None,
        Altitude::Barometric(ft) => {
            if ft > config.near_ground_altitude_ft || climbing_out(config, k) {
                Some(GroundState::Airborne)
            } else {
                Some(GroundState::OnGround)
            }
        }
    }
}

fn climbing_out(config: &SegmenterConfig, k: &Kinematics) -> bool {
    let fast = k.speed().is_some_and(|gs| gs > config.takeoff_speed_kts);
    let climbing = k
        .vertical_rate_fpm
        .is_some_and(|vr| vr >= config.takeoff_vertical_rate_fpm);
    fast || climbing
}

/// OnGround -> Airborne
///
/// After an explicit ground report, a barometric altitude plus takeoff speed or a strong
/// climb. After a near-zero barometric landing, speed is not enough: the altitude must
/// clear the near-zero band or the climb must be strong.
pub(crate) fn takeoff_detected(config: &SegmenterConfig, basis: GroundBasis, k: &Kinematics) -> bool {
    let Altitude::Barometric(ft) = k.altitude else {
        return false;
    };
    match basis {
        GroundBasis::Reported => climbing_out(config, k),
        GroundBasis::Barometric => {
            ft > config.near_ground_altitude_ft
                || k.vertical_rate_fpm
                    .is_some_and(|vr| vr >= config.takeoff_vertical_rate_fpm)
        }
    }
}

/// Airborne -> OnGround: an explicit ground report, or a near-zero barometric altitude
/// with a low or negative vertical rate and a slowing ground speed
pub(crate) fn landing_detected(config: &SegmenterConfig, k: &Kinematics) -> bool {
    match k.altitude {
        Altitude::OnGround => true,
        Altitude::Unknown => false,
        Altitude::Barometric(ft) => {
            if ft > config.near_ground_altitude_ft {
                return false;
            }
            let settling = k
                .vertical_rate_fpm
                .is_some_and(|vr| vr <= config.landing_vertical_rate_fpm);
            let slowing = match (k.ground_speed_kts, k.previous_ground_speed_kts) {
                (Some(gs), Some(prev)) => gs < prev || gs <= config.takeoff_speed_kts,
                (Some(gs), None) => gs <= config.takeoff_speed_kts,
                (None, _) => false,
            };
            settling && slowing
        }
    }
}

/// Apply the transition rules for the current state
pub(crate) fn evaluate(
    config: &SegmenterConfig,
    state: GroundState,
    basis: GroundBasis,
    k: &Kinematics,
) -> (GroundState, Option<Transition>) {
    match state {
        GroundState::Unknown => (classify(config, k).unwrap_or(GroundState::Unknown), None),
        GroundState::OnGround if takeoff_detected(config, basis, k) => {
            (GroundState::Airborne, Some(Transition::Takeoff))
        }
        GroundState::Airborne if landing_detected(config, k) => {
            (GroundState::OnGround, Some(Transition::Landing))
        }
        unchanged => (unchanged, None),
    }
}
