//! Geographic primitives: bounding boxes, antimeridian-aware extents and
//! dataset footprints.
//!
//! All coordinates are WGS84 longitude/latitude degrees. Relations are always
//! read as "dataset footprint *relation* query area".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Axis-aligned rectangle `(min_lon, min_lat, max_lon, max_lat)`.
///
/// Construction goes through [`BoundingBox::new`], so a value of this type
/// never has `min > max` on either axis. Antimeridian-crossing areas are
/// expressed as an [`Extent`] of two boxes instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

#[derive(Deserialize)]
struct RawBoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = Error;

    fn try_from(raw: RawBoundingBox) -> Result<Self> {
        BoundingBox::new(raw.min_lon, raw.min_lat, raw.max_lon, raw.max_lat)
    }
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        for v in [min_lon, min_lat, max_lon, max_lat] {
            if !v.is_finite() {
                return Err(Error::invalid(format!("bounding box coordinate {v} is not finite")));
            }
        }
        if !(-180.0..=180.0).contains(&min_lon) || !(-180.0..=180.0).contains(&max_lon) {
            return Err(Error::invalid(format!("longitude out of range in [{min_lon}, {max_lon}]")));
        }
        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            return Err(Error::invalid(format!("latitude out of range in [{min_lat}, {max_lat}]")));
        }
        if min_lon > max_lon {
            return Err(Error::invalid(format!(
                "min_lon {min_lon} > max_lon {max_lon}; antimeridian-crossing areas must be built with Extent::from_wrapping"
            )));
        }
        if min_lat > max_lat {
            return Err(Error::invalid(format!("min_lat {min_lat} > max_lat {max_lat}")));
        }
        Ok(Self { min_lon, min_lat, max_lon, max_lat })
    }

    pub fn min_lon(&self) -> f64 { self.min_lon }
    pub fn min_lat(&self) -> f64 { self.min_lat }
    pub fn max_lon(&self) -> f64 { self.max_lon }
    pub fn max_lat(&self) -> f64 { self.max_lat }

    pub fn width(&self) -> f64 { self.max_lon - self.min_lon }
    pub fn height(&self) -> f64 { self.max_lat - self.min_lat }
    pub fn area(&self) -> f64 { self.width() * self.height() }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_lon + self.max_lon) / 2.0, (self.min_lat + self.max_lat) / 2.0)
    }

    /// Closed-interval overlap test; touching edges count as intersecting.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.min_lon
            && self.max_lon >= other.max_lon
            && self.min_lat <= other.min_lat
            && self.max_lat >= other.max_lat
    }

    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Strict interior test, boundary excluded.
    pub fn interior_contains_point(&self, lon: f64, lat: f64) -> bool {
        lon > self.min_lon && lon < self.max_lon && lat > self.min_lat && lat < self.max_lat
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }
        Some(BoundingBox {
            min_lon: self.min_lon.max(other.min_lon),
            min_lat: self.min_lat.max(other.min_lat),
            max_lon: self.max_lon.min(other.max_lon),
            max_lat: self.max_lat.min(other.max_lat),
        })
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// Corners in counter-clockwise order starting at the south-west corner.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_lon, self.min_lat),
            (self.max_lon, self.min_lat),
            (self.max_lon, self.max_lat),
            (self.min_lon, self.max_lat),
        ]
    }

    fn edges(&self) -> [((f64, f64), (f64, f64)); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.4}, {:.4}, {:.4}, {:.4}]", self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}

/// A query area: a single box, or two boxes when the area crosses the
/// antimeridian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    parts: Vec<BoundingBox>,
}

impl Extent {
    pub fn single(bbox: BoundingBox) -> Self {
        Self { parts: vec![bbox] }
    }

    /// Build an extent from west/south/east/north edges where `west > east`
    /// means the area wraps across the antimeridian.
    pub fn from_wrapping(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
        if west <= east {
            return Ok(Self::single(BoundingBox::new(west, south, east, north)?));
        }
        let eastern = BoundingBox::new(west, south, 180.0, north)?;
        let western = BoundingBox::new(-180.0, south, east, north)?;
        Ok(Self { parts: vec![eastern, western] })
    }

    pub fn parts(&self) -> &[BoundingBox] { &self.parts }

    pub fn crosses_antimeridian(&self) -> bool { self.parts.len() > 1 }
}

impl From<BoundingBox> for Extent {
    fn from(bbox: BoundingBox) -> Self { Extent::single(bbox) }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.parts.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" + "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialRelation {
    #[default]
    Intersects,
    Within,
    Contains,
}

impl fmt::Display for SpatialRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpatialRelation::Intersects => "intersects",
            SpatialRelation::Within => "within",
            SpatialRelation::Contains => "contains",
        };
        f.write_str(s)
    }
}

impl FromStr for SpatialRelation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intersects" => Ok(SpatialRelation::Intersects),
            "within" => Ok(SpatialRelation::Within),
            "contains" => Ok(SpatialRelation::Contains),
            other => Err(Error::invalid(format!("unknown spatial relation '{other}'"))),
        }
    }
}

/// Simple polygon given by its exterior ring (no holes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPolygon")]
pub struct Polygon {
    exterior: Vec<[f64; 2]>,
    #[serde(skip_serializing)]
    envelope: BoundingBox,
}

#[derive(Deserialize)]
struct RawPolygon {
    exterior: Vec<[f64; 2]>,
}

impl TryFrom<RawPolygon> for Polygon {
    type Error = Error;

    fn try_from(raw: RawPolygon) -> Result<Self> {
        Polygon::new(raw.exterior)
    }
}

impl Polygon {
    /// Validates the ring; a closing vertex equal to the first one is dropped.
    pub fn new(mut exterior: Vec<[f64; 2]>) -> Result<Self> {
        if exterior.len() > 1 && exterior.first() == exterior.last() {
            exterior.pop();
        }
        if exterior.len() < 3 {
            return Err(Error::invalid(format!("polygon needs at least 3 vertices, got {}", exterior.len())));
        }
        let mut env: Option<BoundingBox> = None;
        for &[lon, lat] in &exterior {
            let point = BoundingBox::new(lon, lat, lon, lat)?;
            env = Some(match env { Some(e) => e.union(&point), None => point });
        }
        let envelope = env.ok_or_else(|| Error::invalid("empty polygon"))?;
        if envelope.area() <= 0.0 {
            return Err(Error::invalid("polygon is degenerate (zero area envelope)"));
        }
        Ok(Self { exterior, envelope })
    }

    pub fn exterior(&self) -> &[[f64; 2]] { &self.exterior }

    pub fn envelope(&self) -> BoundingBox { self.envelope }

    fn edges(&self) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
        let n = self.exterior.len();
        (0..n).map(move |i| {
            let a = self.exterior[i];
            let b = self.exterior[(i + 1) % n];
            ((a[0], a[1]), (b[0], b[1]))
        })
    }

    /// Point-in-polygon by ray casting; points on the boundary count as inside.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        let p = (lon, lat);
        if self.edges().any(|(a, b)| on_segment(a, b, p)) {
            return true;
        }
        let mut inside = false;
        for ((xi, yi), (xj, yj)) in self.edges() {
            if (yi > lat) != (yj > lat) {
                let x_cross = xi + (lat - yi) * (xj - xi) / (yj - yi);
                if lon < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    pub fn intersects_box(&self, bbox: &BoundingBox) -> bool {
        if !self.envelope().intersects(bbox) {
            return false;
        }
        if self.exterior.iter().any(|&[x, y]| bbox.contains_point(x, y)) {
            return true;
        }
        if bbox.corners().iter().any(|&(x, y)| self.contains_point(x, y)) {
            return true;
        }
        self.edges().any(|(a, b)| bbox.edges().iter().any(|&(c, d)| segments_intersect(a, b, c, d)))
    }

    pub fn within_box(&self, bbox: &BoundingBox) -> bool {
        bbox.contains_box(&self.envelope())
    }

    pub fn contains_box(&self, bbox: &BoundingBox) -> bool {
        if !self.envelope().contains_box(bbox) {
            return false;
        }
        if !bbox.corners().iter().all(|&(x, y)| self.contains_point(x, y)) {
            return false;
        }
        if self.exterior.iter().any(|&[x, y]| bbox.interior_contains_point(x, y)) {
            return false;
        }
        for (a, b) in self.edges() {
            let mid = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
            if bbox.interior_contains_point(mid.0, mid.1) {
                return false;
            }
            if bbox.edges().iter().any(|&(c, d)| segments_cross_properly(a, b, c, d)) {
                return false;
            }
        }
        true
    }
}

fn orientation(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    orientation(a, b, p).abs() <= f64::EPSILON
        && p.0 >= a.0.min(b.0)
        && p.0 <= a.0.max(b.0)
        && p.1 >= a.1.min(b.1)
        && p.1 <= a.1.max(b.1)
}

fn segments_intersect(a: (f64, f64), b: (f64, f64), c: (f64, f64), d: (f64, f64)) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    if ((o1 > 0.0 && o2 < 0.0) || (o1 < 0.0 && o2 > 0.0)) && ((o3 > 0.0 && o4 < 0.0) || (o3 < 0.0 && o4 > 0.0)) {
        return true;
    }
    on_segment(a, b, c) || on_segment(a, b, d) || on_segment(c, d, a) || on_segment(c, d, b)
}

fn segments_cross_properly(a: (f64, f64), b: (f64, f64), c: (f64, f64), d: (f64, f64)) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    o1 * o2 < 0.0 && o3 * o4 < 0.0
}

/// Dataset footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    #[serde(rename = "bbox")]
    BoundingBox(BoundingBox),
    Polygon(Polygon),
}

impl Geometry {
    pub fn envelope(&self) -> BoundingBox {
        match self {
            Geometry::BoundingBox(b) => *b,
            Geometry::Polygon(p) => p.envelope(),
        }
    }

    pub fn intersects(&self, bbox: &BoundingBox) -> bool {
        match self {
            Geometry::BoundingBox(b) => b.intersects(bbox),
            Geometry::Polygon(p) => p.intersects_box(bbox),
        }
    }

    pub fn within(&self, bbox: &BoundingBox) -> bool {
        match self {
            Geometry::BoundingBox(b) => bbox.contains_box(b),
            Geometry::Polygon(p) => p.within_box(bbox),
        }
    }

    pub fn contains(&self, bbox: &BoundingBox) -> bool {
        match self {
            Geometry::BoundingBox(b) => b.contains_box(bbox),
            Geometry::Polygon(p) => p.contains_box(bbox),
        }
    }

    /// Exact relation test against a (possibly antimeridian-split) extent.
    ///
    /// `Intersects` and `Within` hold if they hold for any part; `Contains`
    /// needs every part of the query area inside the footprint.
    pub fn relates(&self, relation: SpatialRelation, extent: &Extent) -> bool {
        match relation {
            SpatialRelation::Intersects => extent.parts().iter().any(|b| self.intersects(b)),
            SpatialRelation::Within => extent.parts().iter().any(|b| self.within(b)),
            SpatialRelation::Contains => extent.parts().iter().all(|b| self.contains(b)),
        }
    }

    /// Fraction of the footprint envelope covered by the extent, in [0, 1].
    pub fn overlap_fraction(&self, extent: &Extent) -> f32 {
        let env = self.envelope();
        let area = env.area();
        if area <= 0.0 {
            let hit = extent.parts().iter().any(|b| b.intersects(&env));
            return if hit { 1.0 } else { 0.0 };
        }
        let covered: f64 = extent
            .parts()
            .iter()
            .filter_map(|b| b.intersection(&env))
            .map(|i| i.area())
            .sum();
        (covered / area).clamp(0.0, 1.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(a: f64, b: f64, c: f64, d: f64) -> BoundingBox {
        BoundingBox::new(a, b, c, d).unwrap()
    }

    #[test]
    fn rejects_inverted_longitudes() {
        let err = BoundingBox::new(170.0, -10.0, -170.0, 10.0).unwrap_err();
        assert!(err.to_string().contains("Extent::from_wrapping"));
    }

    #[test]
    fn wrapping_extent_splits_in_two() {
        let e = Extent::from_wrapping(177.0, -20.0, -178.0, -15.0).unwrap();
        assert!(e.crosses_antimeridian());
        assert_eq!(e.parts()[0], bbox(177.0, -20.0, 180.0, -15.0));
        assert_eq!(e.parts()[1], bbox(-180.0, -20.0, -178.0, -15.0));
    }

    #[test]
    fn triangle_relations() {
        let tri = Polygon::new(vec![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [0.0, 0.0]]).unwrap();
        assert_eq!(tri.exterior().len(), 3);
        // box near the hypotenuse corner: inside the envelope but outside the triangle
        assert!(!tri.intersects_box(&bbox(8.0, 8.0, 9.0, 9.0)));
        assert!(tri.intersects_box(&bbox(4.0, 4.0, 9.0, 9.0)));
        assert!(tri.contains_box(&bbox(1.0, 1.0, 2.0, 2.0)));
        assert!(!tri.contains_box(&bbox(1.0, 1.0, 6.0, 6.0)));
        assert!(tri.within_box(&bbox(-1.0, -1.0, 11.0, 11.0)));
    }

    #[test]
    fn contains_requires_every_part() {
        let world = Geometry::BoundingBox(bbox(-180.0, -90.0, 180.0, 90.0));
        let east_only = Geometry::BoundingBox(bbox(170.0, -30.0, 180.0, 0.0));
        let e = Extent::from_wrapping(177.0, -20.0, -178.0, -15.0).unwrap();
        assert!(world.relates(SpatialRelation::Contains, &e));
        assert!(!east_only.relates(SpatialRelation::Contains, &e));
        assert!(east_only.relates(SpatialRelation::Intersects, &e));
    }

    #[test]
    fn overlap_fraction_of_half_covered_box() {
        let g = Geometry::BoundingBox(bbox(0.0, 0.0, 2.0, 2.0));
        let e = Extent::single(bbox(1.0, -5.0, 5.0, 5.0));
        assert!((g.overlap_fraction(&e) - 0.5).abs() < 1e-6);
    }
}
