//! Named geographic zones and the index that answers membership queries.
//!
//! A zone is either a plain polygon or a corridor: a polygon plus an allowed arc of
//! headings. The index is built once from the study configuration and is read-only
//! afterwards, so it is shared across worker threads without locking.

pub mod dms;
pub mod geometry;

use std::collections::HashMap;

use geo::{Coord, Rect};
use serde::Serialize;
use tracing::debug;

use crate::errors::StudyConfigError;
use crate::trace::PositionSample;
use geometry::{HeadingArc, point_in_ring, rect_contains, ring_bounds, ring_from_lat_lon};

/// Result of testing one sample against one zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneMatch {
    Inside,
    Outside,
    /// Inside a corridor's geometry but the heading is unknown; the caller decides
    Ambiguous,
}

/// Result of `ZoneIndex::classify_corridor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorridorMatch<'a> {
    Matched(&'a str),
    Ambiguous(&'a str),
}

impl<'a> CorridorMatch<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            CorridorMatch::Matched(name) | CorridorMatch::Ambiguous(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ZoneKind {
    Polygon,
    Corridor(HeadingArc),
}

#[derive(Debug, Clone)]
pub struct Zone {
    name: String,
    kind: ZoneKind,
    ring: Vec<Coord<f64>>,
    bounds: Rect<f64>,
}

impl Zone {
    /// A polygon zone from `(lat, lon)` vertices. The ring is closed automatically.
    pub fn polygon(name: &str, vertices: &[(f64, f64)]) -> Result<Self, StudyConfigError> {
        Self::build(name, ZoneKind::Polygon, vertices)
    }

    /// A corridor: polygon geometry plus a clockwise heading arc `from..=to`
    pub fn corridor(
        name: &str,
        vertices: &[(f64, f64)],
        heading_from: f64,
        heading_to: f64,
    ) -> Result<Self, StudyConfigError> {
        for heading in [heading_from, heading_to] {
            if !(0.0..=360.0).contains(&heading) {
                return Err(StudyConfigError::InvalidZone {
                    name: name.to_string(),
                    reason: format!("heading {} outside [0, 360]", heading),
                });
            }
        }
        Self::build(
            name,
            ZoneKind::Corridor(HeadingArc::new(heading_from, heading_to)),
            vertices,
        )
    }

    fn build(
        name: &str,
        kind: ZoneKind,
        vertices: &[(f64, f64)],
    ) -> Result<Self, StudyConfigError> {
        let invalid = |reason: String| StudyConfigError::InvalidZone {
            name: name.to_string(),
            reason,
        };

        if name.trim().is_empty() {
            return Err(invalid("zone name is empty".to_string()));
        }
        let out_of_range = |&(lat, lon): &(f64, f64)| {
            !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0
        };
        if let Some((lat, lon)) = vertices.iter().copied().find(|v| out_of_range(v)) {
            return Err(invalid(format!("vertex ({}, {}) out of range", lat, lon)));
        }

        let ring = ring_from_lat_lon(vertices);
        if ring.len() < 3 {
            return Err(invalid(format!(
                "polygon needs at least 3 vertices, got {}",
                ring.len()
            )));
        }
        let bounds = ring_bounds(&ring).ok_or_else(|| invalid("empty polygon".to_string()))?;

        Ok(Self {
            name: name.to_string(),
            kind,
            ring,
            bounds,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ZoneKind {
        &self.kind
    }

    pub fn is_corridor(&self) -> bool {
        matches!(self.kind, ZoneKind::Corridor(_))
    }

    pub fn vertex_count(&self) -> usize {
        self.ring.len()
    }

    /// Geometry-only test, ignoring any heading constraint
    pub fn contains_position(&self, latitude: f64, longitude: f64) -> bool {
        let point = Coord {
            x: longitude,
            y: latitude,
        };
        rect_contains(&self.bounds, point) && point_in_ring(&self.ring, point)
    }

    /// Full membership test for one sample
    pub fn test(&self, sample: &PositionSample) -> ZoneMatch {
        if !self.contains_position(sample.latitude, sample.longitude) {
            return ZoneMatch::Outside;
        }
        match &self.kind {
            ZoneKind::Polygon => ZoneMatch::Inside,
            ZoneKind::Corridor(arc) => match sample.heading.degrees() {
                Some(heading) if arc.contains(heading) => ZoneMatch::Inside,
                Some(_) => ZoneMatch::Outside,
                None => ZoneMatch::Ambiguous,
            },
        }
    }
}

/// Immutable set of named zones, in definition order
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<Zone>,
    by_name: HashMap<String, usize>,
}

impl ZoneIndex {
    pub fn new(zones: Vec<Zone>) -> Result<Self, StudyConfigError> {
        let mut by_name = HashMap::with_capacity(zones.len());
        for (i, zone) in zones.iter().enumerate() {
            if by_name.insert(zone.name.clone(), i).is_some() {
                return Err(StudyConfigError::DuplicateName {
                    kind: "zone",
                    name: zone.name.clone(),
                });
            }
        }
        Ok(Self { zones, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&Zone> {
        self.by_name.get(name).map(|&i| &self.zones[i])
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Three-way membership of a sample in a named zone; unknown names are `Outside`
    pub fn test(&self, zone_name: &str, sample: &PositionSample) -> ZoneMatch {
        match self.get(zone_name) {
            Some(zone) => zone.test(sample),
            None => {
                debug!("Membership query for unknown zone '{}'", zone_name);
                ZoneMatch::Outside
            }
        }
    }

    /// True only for a definite match; an ambiguous corridor sample is not contained
    pub fn contains(&self, zone_name: &str, sample: &PositionSample) -> bool {
        self.test(zone_name, sample) == ZoneMatch::Inside
    }

    /// The first corridor (in definition order) the sample travels along
    ///
    /// A definite match anywhere wins over an ambiguous one.
    pub fn classify_corridor(&self, sample: &PositionSample) -> Option<CorridorMatch<'_>> {
        let mut ambiguous = None;
        for zone in self.zones.iter().filter(|z| z.is_corridor()) {
            match zone.test(sample) {
                ZoneMatch::Inside => return Some(CorridorMatch::Matched(zone.name.as_str())),
                ZoneMatch::Ambiguous if ambiguous.is_none() => {
                    ambiguous = Some(CorridorMatch::Ambiguous(zone.name.as_str()));
                }
                _ => {}
            }
        }
        ambiguous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Altitude, FlagSet, Heading};
    use chrono::DateTime;

    fn sample_at(latitude: f64, longitude: f64, heading: Heading) -> PositionSample {
        PositionSample {
            offset_seconds: 0.0,
            absolute_time: DateTime::from_timestamp(1_738_972_800, 0).unwrap(),
            latitude,
            longitude,
            altitude: Altitude::Barometric(2000),
            ground_speed_kts: Some(160.0),
            track_deg: heading.degrees(),
            heading,
            vertical_rate_fpm: None,
            flags: FlagSet::default(),
            geometric_altitude_ft: None,
            geometric_vertical_rate_fpm: None,
            indicated_airspeed_kts: None,
            roll_angle_deg: None,
            source_type: None,
            metadata: None,
        }
    }

    const SQUARE: [(f64, f64); 4] = [
        (1.30, 103.90),
        (1.30, 104.00),
        (1.40, 104.00),
        (1.40, 103.90),
    ];

    fn index() -> ZoneIndex {
        ZoneIndex::new(vec![
            Zone::polygon("airfield", &SQUARE).unwrap(),
            Zone::corridor("northbound", &SQUARE, 315.0, 45.0).unwrap(),
            Zone::corridor("westbound", &SQUARE, 225.0, 315.0).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_polygon_membership() {
        let zones = index();
        assert!(zones.contains("airfield", &sample_at(1.35, 103.95, Heading::Unknown)));
        assert!(!zones.contains("airfield", &sample_at(10.0, 90.0, Heading::Unknown)));
        assert!(!zones.contains("nowhere", &sample_at(1.35, 103.95, Heading::Unknown)));
    }

    #[test]
    fn test_corridor_requires_heading_in_arc() {
        let zones = index();
        let north = sample_at(1.35, 103.95, Heading::Track(10.0));
        assert_eq!(zones.test("northbound", &north), ZoneMatch::Inside);
        assert_eq!(zones.test("westbound", &north), ZoneMatch::Outside);
        assert_eq!(
            zones.classify_corridor(&north),
            Some(CorridorMatch::Matched("northbound"))
        );

        let west = sample_at(1.35, 103.95, Heading::TrueHeading(270.0));
        assert_eq!(
            zones.classify_corridor(&west),
            Some(CorridorMatch::Matched("westbound"))
        );

        let south = sample_at(1.35, 103.95, Heading::Track(180.0));
        assert_eq!(zones.classify_corridor(&south), None);
    }

    #[test]
    fn test_unknown_heading_is_ambiguous_not_guessed() {
        let zones = index();
        let sample = sample_at(1.35, 103.95, Heading::Unknown);
        assert_eq!(zones.test("northbound", &sample), ZoneMatch::Ambiguous);
        assert!(!zones.contains("northbound", &sample));
        assert_eq!(
            zones.classify_corridor(&sample),
            Some(CorridorMatch::Ambiguous("northbound"))
        );

        let outside = sample_at(5.0, 100.0, Heading::Unknown);
        assert_eq!(zones.classify_corridor(&outside), None);
    }

    #[test]
    fn test_duplicate_and_degenerate_zones_rejected() {
        let err = ZoneIndex::new(vec![
            Zone::polygon("a", &SQUARE).unwrap(),
            Zone::polygon("a", &SQUARE).unwrap(),
        ])
        .unwrap_err();
        assert!(matches!(err, StudyConfigError::DuplicateName { kind: "zone", .. }));

        let closed_triangle = [(0.0, 0.0), (0.0, 1.0), (0.0, 0.0)];
        assert!(Zone::polygon("line", &closed_triangle).is_err());
        assert!(Zone::polygon("bad", &[(95.0, 0.0), (0.0, 1.0), (1.0, 1.0)]).is_err());
        assert!(Zone::corridor("bad", &SQUARE, -10.0, 20.0).is_err());
    }
}
