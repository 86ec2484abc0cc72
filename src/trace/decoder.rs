use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::sample::{
    AircraftDbFlags, AircraftSnapshot, Altitude, FlagSet, GROUND_MARKER, Heading, PositionSample,
    SourceType, Trace,
};
use crate::errors::{DecodeError, TraceError};

/// Number of elements in a readsb trace point
pub const TRACE_TUPLE_LEN: usize = 14;

/// Maximum number of individual decode errors kept per trace for reporting
const MAX_KEPT_ERRORS: usize = 20;

/// Top-level layout of a decompressed `trace_full_<icao>.json` document
#[derive(Debug, Deserialize)]
struct RawTraceFile {
    icao: Option<String>,
    timestamp: Option<f64>,
    trace: Option<Vec<Value>>,
    r: Option<Value>,
    t: Option<Value>,
    desc: Option<Value>,
    #[serde(rename = "dbFlags")]
    db_flags: Option<Value>,
}

/// Result of decoding one aircraft-day document
#[derive(Debug, Clone)]
pub struct DecodedTrace {
    pub trace: Trace,
    /// Points rejected as `MalformedTuple`
    pub dropped_points: usize,
    /// Points whose metadata object could not be read (the point itself was kept)
    pub metadata_discarded: usize,
    /// Optional top-level keys (`r`, `t`, `desc`, `dbFlags`) ignored for a bad value
    pub header_fields_discarded: usize,
    /// The first few decode errors, for diagnostics
    pub errors: Vec<DecodeError>,
}

/// Decode a whole trace document from its JSON text
pub fn decode_trace_json(json: &str) -> Result<DecodedTrace, TraceError> {
    let value: Value = serde_json::from_str(json)?;
    decode_trace(value)
}

/// Decode a whole trace document
///
/// Missing `icao`, `timestamp` or `trace` rejects the file. Individual malformed
/// points are dropped and counted; everything else is decoded.
pub fn decode_trace(value: Value) -> Result<DecodedTrace, TraceError> {
    if !value.is_object() {
        return Err(TraceError::InvalidJson(
            "top-level value is not an object".to_string(),
        ));
    }
    let raw: RawTraceFile = serde_json::from_value(value)?;

    let icao = raw
        .icao
        .ok_or(TraceError::MissingRequiredTopLevelKey("icao"))?;
    let base_timestamp = raw
        .timestamp
        .ok_or(TraceError::MissingRequiredTopLevelKey("timestamp"))?;
    let raw_points = raw
        .trace
        .ok_or(TraceError::MissingRequiredTopLevelKey("trace"))?;

    let mut points = Vec::with_capacity(raw_points.len());
    let mut dropped_points = 0;
    let mut metadata_discarded = 0;
    let mut errors = Vec::new();

    for (index, raw_point) in raw_points.iter().enumerate() {
        match decode_point(raw_point, index, base_timestamp) {
            Ok(decoded) => {
                if decoded.metadata_discarded {
                    metadata_discarded += 1;
                }
                points.push(decoded.sample);
            }
            Err(e) => {
                debug!("Dropping point of {}: {}", icao, e);
                dropped_points += 1;
                if errors.len() < MAX_KEPT_ERRORS {
                    errors.push(e);
                }
            }
        }
    }

    if dropped_points > 0 {
        warn!(
            "Dropped {} of {} malformed points for {}",
            dropped_points,
            raw_points.len(),
            icao
        );
        metrics::counter!("trace_decoder.points_dropped_total").increment(dropped_points as u64);
    }
    metrics::counter!("trace_decoder.points_decoded_total").increment(points.len() as u64);

    let mut header_fields_discarded = 0;
    let discarded = &mut header_fields_discarded;
    let text = |v: &Value| v.as_str().filter(|s| !s.is_empty()).map(str::to_string);
    let registration = read_lenient("r", raw.r, &icao, discarded, text);
    let type_code = read_lenient("t", raw.t, &icao, discarded, text);
    let description = read_lenient("desc", raw.desc, &icao, discarded, text);
    let db_flags = read_lenient("dbFlags", raw.db_flags, &icao, discarded, Value::as_u64)
        .map(AircraftDbFlags::from_bits);
    if header_fields_discarded > 0 {
        metrics::counter!("trace_decoder.header_fields_discarded_total")
            .increment(header_fields_discarded as u64);
    }

    Ok(DecodedTrace {
        trace: Trace {
            icao,
            base_timestamp,
            registration,
            type_code,
            description,
            db_flags,
            points,
        },
        dropped_points,
        metadata_discarded,
        header_fields_discarded,
        errors,
    })
}

/// Read an optional descriptive key, ignoring (and counting) a value of the wrong shape
fn read_lenient<T>(
    key: &str,
    value: Option<Value>,
    icao: &str,
    discarded: &mut usize,
    read: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let value = value?;
    let parsed = read(&value);
    if parsed.is_none() && value.as_str() != Some("") {
        warn!("Ignoring {} of {}: unexpected value {}", key, icao, value);
        *discarded += 1;
    }
    parsed
}

/// A decoded point plus a note about its metadata element
#[derive(Debug, Clone)]
pub struct DecodedPoint {
    pub sample: PositionSample,
    pub metadata_discarded: bool,
}

/// Decode one raw trace tuple
///
/// Layout: offset, lat, lon, altitude, ground speed, track, flags, vertical rate,
/// metadata, source type, geometric altitude, geometric vertical rate, IAS, roll.
/// Elements after the 14th are ignored.
pub fn decode_point(
    raw: &Value,
    index: usize,
    base_timestamp: f64,
) -> Result<DecodedPoint, DecodeError> {
    let fields = raw
        .as_array()
        .ok_or_else(|| DecodeError::malformed(index, "trace point is not an array"))?;

    if fields.len() < TRACE_TUPLE_LEN {
        return Err(DecodeError::malformed(
            index,
            format!(
                "expected {} elements, got {}",
                TRACE_TUPLE_LEN,
                fields.len()
            ),
        ));
    }

    let offset_seconds = required_f64(&fields[0], index, "offset")?;
    if offset_seconds < 0.0 {
        return Err(DecodeError::malformed(
            index,
            format!("negative offset {}", offset_seconds),
        ));
    }

    let latitude = required_f64(&fields[1], index, "latitude")?;
    if latitude.abs() > 90.0 {
        return Err(DecodeError::malformed(
            index,
            format!("latitude {} out of range", latitude),
        ));
    }
    let longitude = required_f64(&fields[2], index, "longitude")?;
    if longitude.abs() > 180.0 {
        return Err(DecodeError::malformed(
            index,
            format!("longitude {} out of range", longitude),
        ));
    }

    let altitude = decode_altitude(&fields[3], index)?;
    let ground_speed_kts = optional_f64(&fields[4], index, "ground speed")?;
    let track_deg = optional_f64(&fields[5], index, "track")?;
    let flags = FlagSet::from_bits(decode_flag_bits(&fields[6], index)?);
    let vertical_rate_fpm = optional_i32(&fields[7], index, "vertical rate")?;

    let (metadata, metadata_discarded) = match &fields[8] {
        Value::Null => (None, false),
        Value::Object(_) => match AircraftSnapshot::deserialize(&fields[8]) {
            Ok(snapshot) => (Some(snapshot), false),
            Err(e) => {
                debug!("Ignoring unreadable metadata at point {}: {}", index, e);
                (None, true)
            }
        },
        _ => (None, true),
    };

    let source_type = match &fields[9] {
        Value::Null => None,
        Value::String(s) => Some(SourceType::from_raw(s)),
        _ => {
            return Err(DecodeError::malformed(index, "source type is not a string"));
        }
    };

    let geometric_altitude_ft = optional_i32(&fields[10], index, "geometric altitude")?;
    let geometric_vertical_rate_fpm =
        optional_i32(&fields[11], index, "geometric vertical rate")?;
    let indicated_airspeed_kts = optional_f64(&fields[12], index, "indicated airspeed")?;
    let roll_angle_deg = optional_f64(&fields[13], index, "roll angle")?;

    let heading = resolve_heading(track_deg, metadata.as_ref());
    let absolute_time = absolute_time(base_timestamp, offset_seconds)
        .ok_or_else(|| DecodeError::malformed(index, "timestamp out of range"))?;

    Ok(DecodedPoint {
        sample: PositionSample {
            offset_seconds,
            absolute_time,
            latitude,
            longitude,
            altitude,
            ground_speed_kts,
            track_deg,
            heading,
            vertical_rate_fpm,
            flags,
            geometric_altitude_ft,
            geometric_vertical_rate_fpm,
            indicated_airspeed_kts,
            roll_angle_deg,
            source_type,
            metadata,
        },
        metadata_discarded,
    })
}

/// `"ground"` -> OnGround, number -> Barometric, null -> Unknown
pub fn decode_altitude(raw: &Value, index: usize) -> Result<Altitude, DecodeError> {
    match raw {
        Value::Null => Ok(Altitude::Unknown),
        Value::String(s) if s == GROUND_MARKER => Ok(Altitude::OnGround),
        Value::Number(_) => {
            let feet = required_f64(raw, index, "altitude")?;
            Ok(Altitude::Barometric(to_i32(feet, index, "altitude")?))
        }
        other => Err(DecodeError::malformed(
            index,
            format!("unexpected altitude value {}", other),
        )),
    }
}

/// Track first, then the metadata's true heading, else unknown
pub fn resolve_heading(track_deg: Option<f64>, metadata: Option<&AircraftSnapshot>) -> Heading {
    if let Some(track) = track_deg {
        return Heading::Track(track);
    }
    match metadata.and_then(|m| m.true_heading) {
        Some(true_heading) => Heading::TrueHeading(true_heading),
        None => Heading::Unknown,
    }
}

fn absolute_time(base_timestamp: f64, offset_seconds: f64) -> Option<DateTime<Utc>> {
    let total = base_timestamp + offset_seconds;
    if !total.is_finite() {
        return None;
    }
    let secs = total.floor();
    let nanos = (((total - secs) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(secs as i64, nanos)
}

fn decode_flag_bits(raw: &Value, index: usize) -> Result<u64, DecodeError> {
    if let Some(bits) = raw.as_u64() {
        return Ok(bits);
    }
    match raw.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        _ => Err(DecodeError::malformed(
            index,
            format!("flags value {} is not a non-negative integer", raw),
        )),
    }
}

fn required_f64(raw: &Value, index: usize, field: &str) -> Result<f64, DecodeError> {
    optional_f64(raw, index, field)?
        .ok_or_else(|| DecodeError::malformed(index, format!("{} is missing", field)))
}

fn optional_f64(raw: &Value, index: usize, field: &str) -> Result<Option<f64>, DecodeError> {
    match raw {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(DecodeError::malformed(
                index,
                format!("{} is not a finite number", field),
            )),
        },
        other => Err(DecodeError::malformed(
            index,
            format!("{} has unexpected value {}", field, other),
        )),
    }
}

fn optional_i32(raw: &Value, index: usize, field: &str) -> Result<Option<i32>, DecodeError> {
    optional_f64(raw, index, field)?
        .map(|v| to_i32(v, index, field))
        .transpose()
}

/// Round to the nearest integer, rejecting values an `i32` cannot hold
fn to_i32(value: f64, index: usize, field: &str) -> Result<i32, DecodeError> {
    let rounded = value.round();
    if rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        return Err(DecodeError::malformed(
            index,
            format!("{} value {} is out of range", field, value),
        ));
    }
    Ok(rounded as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: f64 = 1_738_972_800.0; // 2025-02-08T00:00:00Z

    fn point(altitude: Value, flags: u64) -> Value {
        json!([
            12.5, 1.35, 103.99, altitude, 145.2, 20.5, flags, -640, null, "adsb_icao", 3125,
            -512, 150, -1.2
        ])
    }

    #[test]
    fn test_decode_full_point() {
        let decoded = decode_point(&point(json!(3000), 0), 0, BASE).unwrap();
        let s = decoded.sample;
        assert_eq!(s.altitude, Altitude::Barometric(3000));
        assert_eq!(s.ground_speed_kts, Some(145.2));
        assert_eq!(s.vertical_rate_fpm, Some(-640));
        assert_eq!(s.geometric_altitude_ft, Some(3125));
        assert_eq!(s.source_type, Some(SourceType::AdsbIcao));
        assert_eq!(s.heading, Heading::Track(20.5));
        assert_eq!(s.absolute_time.timestamp(), BASE as i64 + 12);
        assert_eq!(s.absolute_time.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_altitude_three_way_union_round_trips() {
        for raw in [json!("ground"), json!(0), json!(12500), Value::Null] {
            let altitude = decode_altitude(&raw, 0).unwrap();
            assert_eq!(altitude.to_raw(), raw);
        }
        assert_eq!(decode_altitude(&json!("ground"), 0).unwrap(), Altitude::OnGround);
        assert_eq!(decode_altitude(&json!(0), 0).unwrap(), Altitude::Barometric(0));
        assert_eq!(decode_altitude(&Value::Null, 0).unwrap(), Altitude::Unknown);
        assert_ne!(Altitude::OnGround, Altitude::Barometric(0));
        assert_ne!(Altitude::Unknown, Altitude::Barometric(0));
    }

    #[test]
    fn test_altitude_rejects_other_strings() {
        assert!(decode_altitude(&json!("surface"), 3).is_err());
    }

    #[test]
    fn test_flag_bits_match_binary_representation() {
        for f in 0u64..=15 {
            let flags = FlagSet::from_bits(f);
            assert_eq!(flags.stale, f & 1 != 0);
            assert_eq!(flags.new_leg, f & 2 != 0);
            assert_eq!(flags.vertical_rate_is_geometric, f & 4 != 0);
            assert_eq!(flags.altitude_is_geometric, f & 8 != 0);
            assert_eq!(flags.reserved, 0);
            assert_eq!(flags.to_bits(), f);
        }

        let five = FlagSet::from_bits(5);
        assert!(five.stale && five.vertical_rate_is_geometric);
        assert!(!five.new_leg && !five.altitude_is_geometric);
    }

    #[test]
    fn test_reserved_flag_bits_are_preserved() {
        let flags = FlagSet::from_bits(0b1_0010);
        assert!(flags.new_leg);
        assert_eq!(flags.reserved, 0b1_0000);
        assert_eq!(flags.to_bits(), 0b1_0010);
    }

    #[test]
    fn test_short_tuple_is_malformed() {
        let raw = json!([1.0, 1.35, 103.99, 3000]);
        let err = decode_point(&raw, 7, BASE).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedTuple { index: 7, .. }));
    }

    #[test]
    fn test_bad_types_are_malformed() {
        let mut raw = point(json!(3000), 0);
        raw[1] = json!("north");
        assert!(decode_point(&raw, 0, BASE).is_err());

        let mut raw = point(json!(3000), 0);
        raw[6] = json!(-1);
        assert!(decode_point(&raw, 0, BASE).is_err());

        let mut raw = point(json!(3000), 0);
        raw[2] = json!(181.0);
        assert!(decode_point(&raw, 0, BASE).is_err());
    }

    #[test]
    fn test_out_of_range_integers_are_malformed() {
        let raw = point(json!(1e12), 0);
        let err = decode_point(&raw, 3, BASE).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedTuple { index: 3, .. }));

        let mut raw = point(json!(3000), 0);
        raw[7] = json!(-5e10);
        assert!(decode_point(&raw, 0, BASE).is_err());

        let mut raw = point(json!(3000), 0);
        raw[10] = json!(2_147_483_647.0);
        let s = decode_point(&raw, 0, BASE).unwrap().sample;
        assert_eq!(s.geometric_altitude_ft, Some(i32::MAX));
    }

    #[test]
    fn test_heading_falls_back_to_metadata_true_heading() {
        let mut raw = point(json!(3000), 0);
        raw[5] = Value::Null;
        raw[8] = json!({"flight": "SIA321  ", "true_heading": 271.4});
        let s = decode_point(&raw, 0, BASE).unwrap().sample;
        assert_eq!(s.heading, Heading::TrueHeading(271.4));
        assert_eq!(s.metadata.unwrap().flight.as_deref(), Some("SIA321  "));

        let mut raw = point(json!(3000), 0);
        raw[5] = Value::Null;
        let s = decode_point(&raw, 0, BASE).unwrap().sample;
        assert_eq!(s.heading, Heading::Unknown);
    }

    #[test]
    fn test_unreadable_metadata_keeps_point() {
        let mut raw = point(json!(3000), 0);
        raw[8] = json!({"true_heading": "east"});
        let decoded = decode_point(&raw, 0, BASE).unwrap();
        assert!(decoded.metadata_discarded);
        assert!(decoded.sample.metadata.is_none());
    }

    #[test]
    fn test_unknown_source_type_is_preserved() {
        let mut raw = point(json!(3000), 0);
        raw[9] = json!("adsb_future");
        let s = decode_point(&raw, 0, BASE).unwrap().sample;
        assert_eq!(
            s.source_type,
            Some(SourceType::Unrecognized("adsb_future".to_string()))
        );
    }

    #[test]
    fn test_decode_trace_drops_malformed_points() {
        let doc = json!({
            "icao": "76cd63",
            "timestamp": BASE,
            "r": "9V-SMF",
            "t": "A359",
            "dbFlags": 1,
            "trace": [point(json!("ground"), 0), [1, 2], point(json!(500), 2)]
        });
        let decoded = decode_trace(doc).unwrap();
        assert_eq!(decoded.trace.icao, "76cd63");
        assert_eq!(decoded.trace.points.len(), 2);
        assert_eq!(decoded.dropped_points, 1);
        assert_eq!(decoded.errors.len(), 1);
        assert!(decoded.trace.db_flags.unwrap().military);
        assert_eq!(decoded.trace.registration.as_deref(), Some("9V-SMF"));
    }

    #[test]
    fn test_bad_optional_header_keys_are_ignored() {
        let doc = json!({
            "icao": "76cd63",
            "timestamp": BASE,
            "r": 42,
            "t": "A359",
            "desc": ["AIRBUS"],
            "dbFlags": -1,
            "trace": [point(json!(500), 0)]
        });
        let decoded = decode_trace(doc).unwrap();
        assert_eq!(decoded.trace.points.len(), 1);
        assert_eq!(decoded.header_fields_discarded, 3);
        assert_eq!(decoded.trace.registration, None);
        assert_eq!(decoded.trace.type_code.as_deref(), Some("A359"));
        assert_eq!(decoded.trace.description, None);
        assert_eq!(decoded.trace.db_flags, None);
    }

    #[test]
    fn test_missing_required_keys_reject_file() {
        let doc = json!({"timestamp": BASE, "trace": []});
        assert_eq!(
            decode_trace(doc).unwrap_err(),
            TraceError::MissingRequiredTopLevelKey("icao")
        );

        let doc = json!({"icao": "abc123", "trace": []});
        assert_eq!(
            decode_trace(doc).unwrap_err(),
            TraceError::MissingRequiredTopLevelKey("timestamp")
        );

        let doc = json!({"icao": "abc123", "timestamp": BASE});
        assert_eq!(
            decode_trace(doc).unwrap_err(),
            TraceError::MissingRequiredTopLevelKey("trace")
        );
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        assert!(matches!(
            decode_trace_json("[1, 2, 3]"),
            Err(TraceError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_trace_json("{not json"),
            Err(TraceError::InvalidJson(_))
        ));
    }
}
