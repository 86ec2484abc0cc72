use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::StudyConfigError;
use crate::flight_tracker::SegmenterConfig;
use crate::windows::{ObservationWindow, parse_study_date, parse_utc_offset};
use crate::zones::{Zone, ZoneIndex, dms};

/// Observation window as written in the TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlWindow {
    pub name: String,
    /// `YYYY-MM-DD` or `YYYY.MM.DD`, in the local zone
    pub date: String,
    pub local_start_hour: u32,
    pub local_end_hour: u32,
    /// e.g. `"+08:00"`
    pub utc_offset: String,
    /// Pre-converted UTC hours, cross-checked when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_start_hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_end_hour: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TomlZoneKind {
    #[default]
    Polygon,
    Corridor,
}

/// Zone definition as written in the TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlZone {
    pub name: String,
    #[serde(default)]
    pub kind: TomlZoneKind,
    /// Inline `[lat, lon]` vertices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertices: Option<Vec<[f64; 2]>>,
    /// DMS bounds file, relative to the study file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_to: Option<f64>,
}

/// Top-level study configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Count corridor samples with an unknown heading as inside
    #[serde(default)]
    pub count_ambiguous_corridors: bool,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub windows: Vec<TomlWindow>,
    #[serde(default)]
    pub zones: Vec<TomlZone>,
}

impl StudyConfigFile {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: StudyConfigFile =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Validate into the immutable context shared by all workers
    ///
    /// `base_dir` resolves relative `bounds_file` paths.
    pub fn into_context(self, base_dir: &Path) -> Result<StudyContext> {
        let mut zones = Vec::with_capacity(self.zones.len());
        for zone in &self.zones {
            zones.push(build_zone(zone, base_dir)?);
        }

        let mut windows = Vec::with_capacity(self.windows.len());
        for window in &self.windows {
            windows.push(build_window(window)?);
        }

        let context = StudyContext::new(ZoneIndex::new(zones)?, windows, self.segmenter)?
            .with_name(self.name)
            .with_count_ambiguous_corridors(self.count_ambiguous_corridors);
        Ok(context)
    }
}

fn build_window(window: &TomlWindow) -> Result<ObservationWindow, StudyConfigError> {
    let date = parse_study_date(&window.date)?;
    let offset = parse_utc_offset(&window.utc_offset)?;
    let built = ObservationWindow::new(
        &window.name,
        date,
        window.local_start_hour,
        window.local_end_hour,
        offset,
    )?;

    match (window.utc_start_hour, window.utc_end_hour) {
        (Some(start), Some(end)) => built.check_utc_hours(start, end)?,
        (None, None) => {}
        (start, end) => {
            let (expected_start, expected_end) = built.utc_hours();
            return Err(StudyConfigError::UtcRangeMismatch {
                name: window.name.clone(),
                given_start: start.unwrap_or(expected_start),
                given_end: end.unwrap_or(expected_end),
                expected_start,
                expected_end,
            });
        }
    }
    Ok(built)
}

fn build_zone(zone: &TomlZone, base_dir: &Path) -> Result<Zone> {
    let vertices: Vec<(f64, f64)> = match (&zone.vertices, &zone.bounds_file) {
        (Some(inline), None) => inline.iter().map(|[lat, lon]| (*lat, *lon)).collect(),
        (None, Some(bounds_file)) => {
            let path = base_dir.join(bounds_file);
            let contents = std::fs::read_to_string(&path).with_context(|| {
                format!("Failed to read bounds file {:?} for zone '{}'", path, zone.name)
            })?;
            let vertices = dms::parse_bounds(&contents)
                .with_context(|| format!("Failed to parse bounds file {:?}", path))?;
            debug!(
                "Loaded {} vertices for zone '{}' from {:?}",
                vertices.len(),
                zone.name,
                path
            );
            vertices
        }
        (Some(_), Some(_)) => {
            return Err(StudyConfigError::InvalidZone {
                name: zone.name.clone(),
                reason: "give either vertices or bounds_file, not both".to_string(),
            }
            .into());
        }
        (None, None) => {
            return Err(StudyConfigError::InvalidZone {
                name: zone.name.clone(),
                reason: "missing vertices or bounds_file".to_string(),
            }
            .into());
        }
    };

    let built = match zone.kind {
        TomlZoneKind::Polygon => Zone::polygon(&zone.name, &vertices)?,
        TomlZoneKind::Corridor => {
            let (Some(from), Some(to)) = (zone.heading_from, zone.heading_to) else {
                return Err(StudyConfigError::InvalidZone {
                    name: zone.name.clone(),
                    reason: "corridor needs heading_from and heading_to".to_string(),
                }
                .into());
            };
            Zone::corridor(&zone.name, &vertices, from, to)?
        }
    };
    Ok(built)
}

/// Validated, immutable study configuration
///
/// Built once at startup and shared by reference across all workers.
#[derive(Debug, Clone)]
pub struct StudyContext {
    pub name: Option<String>,
    pub zones: ZoneIndex,
    pub windows: Vec<ObservationWindow>,
    pub segmenter: SegmenterConfig,
    pub count_ambiguous_corridors: bool,
}

impl StudyContext {
    pub fn new(
        zones: ZoneIndex,
        windows: Vec<ObservationWindow>,
        segmenter: SegmenterConfig,
    ) -> Result<Self, StudyConfigError> {
        let mut seen = HashSet::new();
        for window in &windows {
            if !seen.insert(window.name.as_str()) {
                return Err(StudyConfigError::DuplicateName {
                    kind: "window",
                    name: window.name.clone(),
                });
            }
        }
        validate_segmenter(&segmenter)?;

        Ok(Self {
            name: None,
            zones,
            windows,
            segmenter,
            count_ambiguous_corridors: false,
        })
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_count_ambiguous_corridors(mut self, count: bool) -> Self {
        self.count_ambiguous_corridors = count;
        self
    }

    /// Log the loaded study, windows with their UTC-converted ranges
    pub fn log_summary(&self) {
        info!(
            "Study {}: {} zones, {} windows",
            self.name.as_deref().unwrap_or("(unnamed)"),
            self.zones.len(),
            self.windows.len()
        );
        for zone in self.zones.zones() {
            info!(
                "  zone {} ({} vertices, {:?})",
                zone.name(),
                zone.vertex_count(),
                zone.kind()
            );
        }
        for window in &self.windows {
            let (start, end) = window.utc_range();
            info!(
                "  window {} {} {:02}:00-{:02}:00 {} = {} .. {}",
                window.name,
                window.date,
                window.local_start_hour,
                window.local_end_hour,
                window.utc_offset,
                start,
                end
            );
        }
    }
}

fn validate_segmenter(config: &SegmenterConfig) -> Result<(), StudyConfigError> {
    if !config.takeoff_speed_kts.is_finite() || config.takeoff_speed_kts < 0.0 {
        return Err(StudyConfigError::InvalidThreshold {
            name: "takeoff_speed_kts",
            value: config.takeoff_speed_kts,
        });
    }
    if config.takeoff_vertical_rate_fpm <= 0 {
        return Err(StudyConfigError::InvalidThreshold {
            name: "takeoff_vertical_rate_fpm",
            value: f64::from(config.takeoff_vertical_rate_fpm),
        });
    }
    if config.near_ground_altitude_ft < 0 {
        return Err(StudyConfigError::InvalidThreshold {
            name: "near_ground_altitude_ft",
            value: f64::from(config.near_ground_altitude_ft),
        });
    }
    if config.climb_rate_window_secs <= 0 {
        return Err(StudyConfigError::InvalidThreshold {
            name: "climb_rate_window_secs",
            value: config.climb_rate_window_secs as f64,
        });
    }
    Ok(())
}

/// Resolve the study config file path.
///
/// Priority:
/// 1. explicit path (`--study`)
/// 2. `LEGWATCH_STUDY_CONFIG` env var
/// 3. `./study.toml`
pub fn study_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("LEGWATCH_STUDY_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("./study.toml")
}

/// Load and validate the study file in one step
pub fn load_study(path: &Path) -> Result<StudyContext> {
    let config = StudyConfigFile::load(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    config
        .into_context(base_dir)
        .with_context(|| format!("Invalid study configuration in {:?}", path))
}
