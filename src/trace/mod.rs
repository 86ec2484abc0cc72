//! readsb trace files: the decoded data model and the decoder that produces it.

mod decoder;
mod sample;

pub use decoder::{
    DecodedPoint, DecodedTrace, TRACE_TUPLE_LEN, decode_altitude, decode_point, decode_trace,
    decode_trace_json, resolve_heading,
};
pub use sample::{
    AircraftDbFlags, AircraftSnapshot, Altitude, FlagSet, GROUND_MARKER, Heading, PositionSample,
    SourceType, Trace,
};
