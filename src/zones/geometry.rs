//! Planar geometry helpers for zone tests.
//!
//! Zones are small (airport and approach areas), so lat/lon are treated as planar
//! x = longitude, y = latitude.

use geo::{BoundingRect, Coord, LineString, Rect};

/// Even-odd ray casting against a closed ring
///
/// Casts a ray towards +x and counts edge crossings. The result does not depend on
/// winding order. Points exactly on an edge may land on either side.
pub fn point_in_ring(ring: &[Coord<f64>], point: Coord<f64>) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x_at_y = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_at_y {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Build a ring from `(lat, lon)` vertices, dropping an explicit closing vertex
pub fn ring_from_lat_lon(vertices: &[(f64, f64)]) -> Vec<Coord<f64>> {
    let mut ring: Vec<Coord<f64>> = vertices
        .iter()
        .map(|&(lat, lon)| Coord { x: lon, y: lat })
        .collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Bounding rectangle of a ring, used to reject far-away points cheaply
pub fn ring_bounds(ring: &[Coord<f64>]) -> Option<Rect<f64>> {
    LineString::from(ring.to_vec()).bounding_rect()
}

pub fn rect_contains(rect: &Rect<f64>, point: Coord<f64>) -> bool {
    let min = rect.min();
    let max = rect.max();
    point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
}

/// A clockwise arc of headings from `from` to `to`, both inclusive, in degrees
///
/// `from == to` is a full circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingArc {
    pub from: f64,
    pub to: f64,
}

impl HeadingArc {
    pub fn new(from: f64, to: f64) -> Self {
        Self {
            from: from.rem_euclid(360.0),
            to: to.rem_euclid(360.0),
        }
    }

    /// Width of the arc in degrees, in (0, 360]
    pub fn width(&self) -> f64 {
        let width = (self.to - self.from).rem_euclid(360.0);
        if width == 0.0 { 360.0 } else { width }
    }

    pub fn contains(&self, heading_deg: f64) -> bool {
        (heading_deg - self.from).rem_euclid(360.0) <= self.width()
    }
}
