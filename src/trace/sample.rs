use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Literal used by readsb traces for an aircraft reporting on-ground
pub const GROUND_MARKER: &str = "ground";

/// Altitude as reported in a trace point
///
/// `OnGround` and `Barometric(0)` are different things: the first is an explicit
/// ground report, the second is a pressure altitude that happens to read zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Altitude {
    OnGround,
    Barometric(i32),
    Unknown,
}

impl Altitude {
    /// Barometric feet, if this is a barometric reading
    pub fn feet(&self) -> Option<i32> {
        match self {
            Altitude::Barometric(ft) => Some(*ft),
            _ => None,
        }
    }

    pub fn is_on_ground(&self) -> bool {
        matches!(self, Altitude::OnGround)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Altitude::Unknown)
    }

    /// Re-encode into the raw trace representation
    pub fn to_raw(&self) -> Value {
        match self {
            Altitude::OnGround => Value::String(GROUND_MARKER.to_string()),
            Altitude::Barometric(ft) => Value::from(*ft),
            Altitude::Unknown => Value::Null,
        }
    }
}

impl Serialize for Altitude {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Altitude::OnGround => serializer.serialize_str(GROUND_MARKER),
            Altitude::Barometric(ft) => serializer.serialize_i32(*ft),
            Altitude::Unknown => serializer.serialize_none(),
        }
    }
}

/// Per-point flags decoded from the trace bitfield
///
/// Bits 0-3 are interpreted; everything above is kept verbatim in `reserved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlagSet {
    pub stale: bool,
    pub new_leg: bool,
    pub vertical_rate_is_geometric: bool,
    pub altitude_is_geometric: bool,
    /// Bits above bit 3, unshifted
    pub reserved: u64,
}

impl FlagSet {
    const STALE: u64 = 1 << 0;
    const NEW_LEG: u64 = 1 << 1;
    const VERTICAL_RATE_GEOMETRIC: u64 = 1 << 2;
    const ALTITUDE_GEOMETRIC: u64 = 1 << 3;
    const KNOWN_MASK: u64 = 0b1111;

    pub fn from_bits(bits: u64) -> Self {
        Self {
            stale: bits & Self::STALE != 0,
            new_leg: bits & Self::NEW_LEG != 0,
            vertical_rate_is_geometric: bits & Self::VERTICAL_RATE_GEOMETRIC != 0,
            altitude_is_geometric: bits & Self::ALTITUDE_GEOMETRIC != 0,
            reserved: bits & !Self::KNOWN_MASK,
        }
    }

    pub fn to_bits(&self) -> u64 {
        let mut bits = self.reserved;
        if self.stale {
            bits |= Self::STALE;
        }
        if self.new_leg {
            bits |= Self::NEW_LEG;
        }
        if self.vertical_rate_is_geometric {
            bits |= Self::VERTICAL_RATE_GEOMETRIC;
        }
        if self.altitude_is_geometric {
            bits |= Self::ALTITUDE_GEOMETRIC;
        }
        bits
    }
}

/// Aircraft database flags (`dbFlags` at the top of a trace file)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AircraftDbFlags {
    pub military: bool,
    pub interesting: bool,
    pub pia: bool,
    pub ladd: bool,
    pub reserved: u64,
}

impl AircraftDbFlags {
    pub fn from_bits(bits: u64) -> Self {
        Self {
            military: bits & 1 != 0,
            interesting: bits & 2 != 0,
            pia: bits & 4 != 0,
            ladd: bits & 8 != 0,
            reserved: bits & !0b1111,
        }
    }
}

/// Message source category, for provenance only
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceType {
    AdsbIcao,
    AdsbIcaoNt,
    AdsrIcao,
    TisbIcao,
    Adsc,
    Mlat,
    Other,
    ModeS,
    AdsbOther,
    AdsrOther,
    TisbOther,
    TisbTrackfile,
    ModeAc,
    Unknown,
    /// Anything readsb may add later
    Unrecognized(String),
}

impl Serialize for SourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl SourceType {
    pub fn from_raw(s: &str) -> Self {
        match s {
            "adsb_icao" => SourceType::AdsbIcao,
            "adsb_icao_nt" => SourceType::AdsbIcaoNt,
            "adsr_icao" => SourceType::AdsrIcao,
            "tisb_icao" => SourceType::TisbIcao,
            "adsc" => SourceType::Adsc,
            "mlat" => SourceType::Mlat,
            "other" => SourceType::Other,
            "mode_s" => SourceType::ModeS,
            "adsb_other" => SourceType::AdsbOther,
            "adsr_other" => SourceType::AdsrOther,
            "tisb_other" => SourceType::TisbOther,
            "tisb_trackfile" => SourceType::TisbTrackfile,
            "mode_ac" => SourceType::ModeAc,
            "unknown" => SourceType::Unknown,
            other => SourceType::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourceType::AdsbIcao => "adsb_icao",
            SourceType::AdsbIcaoNt => "adsb_icao_nt",
            SourceType::AdsrIcao => "adsr_icao",
            SourceType::TisbIcao => "tisb_icao",
            SourceType::Adsc => "adsc",
            SourceType::Mlat => "mlat",
            SourceType::Other => "other",
            SourceType::ModeS => "mode_s",
            SourceType::AdsbOther => "adsb_other",
            SourceType::AdsrOther => "adsr_other",
            SourceType::TisbOther => "tisb_other",
            SourceType::TisbTrackfile => "tisb_trackfile",
            SourceType::ModeAc => "mode_ac",
            SourceType::Unknown => "unknown",
            SourceType::Unrecognized(s) => s,
        }
    }
}

/// Richer per-point attributes (tuple element 8), only used as a fallback
///
/// readsb writes this object only when something changed, so every field is optional
/// and unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AircraftSnapshot {
    #[serde(default)]
    pub flight: Option<String>,
    #[serde(default)]
    pub squawk: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub alt_geom: Option<f64>,
    #[serde(default)]
    pub gs: Option<f64>,
    #[serde(default)]
    pub track: Option<f64>,
    #[serde(default)]
    pub true_heading: Option<f64>,
    #[serde(default)]
    pub mag_heading: Option<f64>,
    #[serde(default)]
    pub baro_rate: Option<f64>,
    #[serde(default)]
    pub geom_rate: Option<f64>,
}

/// Where a sample's heading came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", content = "degrees", rename_all = "snake_case")]
pub enum Heading {
    Track(f64),
    TrueHeading(f64),
    Unknown,
}

impl Heading {
    /// Heading in degrees normalised to [0, 360)
    pub fn degrees(&self) -> Option<f64> {
        match self {
            Heading::Track(d) | Heading::TrueHeading(d) => Some(d.rem_euclid(360.0)),
            Heading::Unknown => None,
        }
    }
}

/// One decoded trace point. Immutable once built by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    pub offset_seconds: f64,
    pub absolute_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Altitude,
    pub ground_speed_kts: Option<f64>,
    pub track_deg: Option<f64>,
    pub heading: Heading,
    pub vertical_rate_fpm: Option<i32>,
    pub flags: FlagSet,
    pub geometric_altitude_ft: Option<i32>,
    pub geometric_vertical_rate_fpm: Option<i32>,
    pub indicated_airspeed_kts: Option<f64>,
    pub roll_angle_deg: Option<f64>,
    pub source_type: Option<SourceType>,
    pub metadata: Option<AircraftSnapshot>,
}

impl PositionSample {
    /// Vertical rate for kinematic decisions: the primary field, else the geometric one
    pub fn effective_vertical_rate(&self) -> Option<i32> {
        self.vertical_rate_fpm.or(self.geometric_vertical_rate_fpm)
    }
}

/// One aircraft, one calendar day
#[derive(Debug, Clone)]
pub struct Trace {
    pub icao: String,
    pub base_timestamp: f64,
    pub registration: Option<String>,
    pub type_code: Option<String>,
    pub description: Option<String>,
    pub db_flags: Option<AircraftDbFlags>,
    pub points: Vec<PositionSample>,
}
