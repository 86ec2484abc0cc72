//! Degrees-minutes-seconds bounds files.
//!
//! One vertex per line, `DDMMSSN DDDMMSSE`, optionally followed by further CSV columns
//! which are ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::StudyConfigError;

static DMS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2,3})(\d{2})(\d{2}(?:\.\d+)?)([NSEW])$").unwrap());

/// Convert one `DDMMSS[NSEW]` / `DDDMMSS[NSEW]` token to signed decimal degrees
pub fn dms_to_decimal(token: &str) -> Result<f64, StudyConfigError> {
    let normalized = token.trim().to_ascii_uppercase();
    let caps = DMS_RE
        .captures(&normalized)
        .ok_or_else(|| StudyConfigError::InvalidDms(token.to_string()))?;

    let invalid = || StudyConfigError::InvalidDms(token.to_string());
    let degrees: f64 = caps[1].parse().map_err(|_| invalid())?;
    let minutes: f64 = caps[2].parse().map_err(|_| invalid())?;
    let seconds: f64 = caps[3].parse().map_err(|_| invalid())?;
    if minutes >= 60.0 || seconds >= 60.0 {
        return Err(invalid());
    }

    let magnitude = degrees + minutes / 60.0 + seconds / 3600.0;
    let (signed, limit) = match &caps[4] {
        "N" => (magnitude, 90.0),
        "S" => (-magnitude, 90.0),
        "E" => (magnitude, 180.0),
        _ => (-magnitude, 180.0),
    };
    if magnitude > limit {
        return Err(invalid());
    }
    Ok(signed)
}

/// Parse the contents of a bounds file into `(lat, lon)` vertices
///
/// Blank lines are skipped. The ring is not closed here; `Zone` does that.
pub fn parse_bounds(contents: &str) -> Result<Vec<(f64, f64)>, StudyConfigError> {
    let mut vertices = Vec::new();

    for line in contents.lines() {
        let first_column = line.split(',').next().unwrap_or("").trim();
        if first_column.is_empty() {
            continue;
        }

        let mut parts = first_column.split_whitespace();
        let (Some(lat_token), Some(lon_token), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(StudyConfigError::InvalidDms(first_column.to_string()));
        };

        let lat = dms_to_decimal(lat_token)?;
        let lon = dms_to_decimal(lon_token)?;
        if !matches!(lat_token.trim().chars().last(), Some('N' | 'S' | 'n' | 's'))
            || !matches!(lon_token.trim().chars().last(), Some('E' | 'W' | 'e' | 'w'))
        {
            return Err(StudyConfigError::InvalidDms(first_column.to_string()));
        }
        vertices.push((lat, lon));
    }

    Ok(vertices)
}
