pub mod aggregator;
pub mod analysis_metrics;
pub mod errors;
pub mod flight_tracker;
pub mod log_format;
pub mod pipeline;
pub mod report;
pub mod study_config;
pub mod trace;
pub mod trace_source;
pub mod windows;
pub mod zones;

pub use aggregator::{RunStats, TraceAggregator};
pub use errors::{DecodeError, StudyConfigError, TraceError};
pub use flight_tracker::{Direction, LegEvent, LegKind, LegSegmenter, segment_trace};
pub use study_config::StudyContext;
pub use trace::{Altitude, FlagSet, PositionSample, Trace};
pub use zones::{Zone, ZoneIndex, ZoneMatch};
