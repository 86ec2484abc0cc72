use thiserror::Error;

/// A single raw trace point could not be turned into a `PositionSample`.
///
/// The offending point is dropped; decoding continues with the rest of the trace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("malformed trace tuple at index {index}: {reason}")]
    MalformedTuple { index: usize, reason: String },
}

impl DecodeError {
    pub(crate) fn malformed(index: usize, reason: impl Into<String>) -> Self {
        DecodeError::MalformedTuple {
            index,
            reason: reason.into(),
        }
    }
}

/// A whole aircraft-day file was rejected. Sibling traces are unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    #[error("missing required top-level key '{0}'")]
    MissingRequiredTopLevelKey(&'static str),

    #[error("invalid trace document: {0}")]
    InvalidJson(String),
}

impl From<serde_json::Error> for TraceError {
    fn from(e: serde_json::Error) -> Self {
        TraceError::InvalidJson(e.to_string())
    }
}

/// Problems found while validating a study configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StudyConfigError {
    #[error("invalid UTC offset '{0}' (expected e.g. \"+08:00\")")]
    InvalidUtcOffset(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD or YYYY.MM.DD)")]
    InvalidDate(String),

    #[error("window '{name}': invalid hour range [{start}, {end})")]
    InvalidHourRange { name: String, start: u32, end: u32 },

    #[error("window '{name}': UTC hours [{given_start}, {given_end}) do not match converted [{expected_start}, {expected_end})")]
    UtcRangeMismatch {
        name: String,
        given_start: u32,
        given_end: u32,
        expected_start: u32,
        expected_end: u32,
    },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("zone '{name}': {reason}")]
    InvalidZone { name: String, reason: String },

    #[error("invalid DMS coordinate '{0}'")]
    InvalidDms(String),

    #[error("segmenter threshold {name} = {value} is invalid")]
    InvalidThreshold { name: &'static str, value: f64 },
}
