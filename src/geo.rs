//! Geometry helpers.
//!
//! Platform-agnostic distance and projection computations on WGS84
//! coordinates (lat/lon in degrees). The segment projection uses a
//! flat-earth approximation that is only valid at city scale: segments
//! longer than a few tens of kilometers will be measured against a
//! skewed projection and must not be fed through it.

use serde::{Deserialize, Serialize};

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Earth radius in kilometers (WGS84 mean).
const EARTH_RADIUS_KM: f64 = 6_371.008_8;

/// Kilometers per degree used by the planar approximation.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Squared segment length (in degrees²) below which a segment is a point.
const DEGENERATE_SEGMENT_SQ: f64 = 1e-20;

pub fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

pub fn to_degrees(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

/// Haversine distance between two points in kilometers.
///
/// Never negative; zero for identical points.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = to_radians(a.lat);
    let lat2 = to_radians(b.lat);
    let dlat = to_radians(b.lat - a.lat);
    let dlon = to_radians(b.lon - a.lon);

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // Rounding can push h a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Haversine distance between two points in meters.
pub fn distance_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    distance_km(a, b) * 1000.0
}

/// Distance from `point` to the segment `line_start`-`line_end`, in kilometers.
///
/// The projection parameter is computed on the raw lat/lon plane and
/// clamped to [0, 1], so points beyond either end measure against the
/// nearest endpoint. A zero-length segment degrades to the plain
/// distance to `line_start`.
pub fn perpendicular_distance_km(
    point: &GeoPoint,
    line_start: &GeoPoint,
    line_end: &GeoPoint,
) -> f64 {
    let projected = project_on_segment(point, line_start, line_end);
    distance_km(point, &projected)
}

/// Nearest point on the segment A-B to P, on the planar approximation.
fn project_on_segment(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> GeoPoint {
    // Uniform km-per-degree scaling on both axes cancels out of t.
    let dx = (b.lon - a.lon) * KM_PER_DEGREE;
    let dy = (b.lat - a.lat) * KM_PER_DEGREE;
    let px = (p.lon - a.lon) * KM_PER_DEGREE;
    let py = (p.lat - a.lat) * KM_PER_DEGREE;

    let seg_len_sq = dx * dx + dy * dy;

    if seg_len_sq < DEGENERATE_SEGMENT_SQ {
        return *a;
    }

    let t = ((px * dx + py * dy) / seg_len_sq).clamp(0.0, 1.0);

    GeoPoint {
        lat: a.lat + t * (b.lat - a.lat),
        lon: a.lon + t * (b.lon - a.lon),
    }
}

/// Result of projecting a position onto a route path.
#[derive(Debug, Clone, Serialize)]
pub struct PathProjection {
    /// Nearest point on the path.
    pub point: GeoPoint,
    /// Index of the path segment start point (0-based).
    pub segment_index: usize,
    /// Distance from the position to the nearest point, in meters.
    pub distance_m: f64,
    /// Distance along the path from its start to the projected point, in meters.
    pub distance_along_m: f64,
}

/// Total length of a path in meters.
pub fn path_length_m(points: &[GeoPoint]) -> f64 {
    points.windows(2).map(|w| distance_m(&w[0], &w[1])).sum()
}

/// Project a position onto the nearest segment of a path.
///
/// Returns None if the path has fewer than 2 points.
pub fn project_on_path(position: &GeoPoint, path: &[GeoPoint]) -> Option<PathProjection> {
    if path.len() < 2 {
        return None;
    }

    let mut best: Option<PathProjection> = None;
    let mut cumulative = 0.0;

    for (i, segment) in path.windows(2).enumerate() {
        let a = &segment[0];
        let b = &segment[1];

        let projected = project_on_segment(position, a, b);
        let dist = distance_m(position, &projected);

        if best.as_ref().map_or(true, |prev| dist < prev.distance_m) {
            best = Some(PathProjection {
                point: projected,
                segment_index: i,
                distance_m: dist,
                distance_along_m: cumulative + distance_m(a, &projected),
            });
        }

        cumulative += distance_m(a, b);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    #[test]
    fn distance_same_point_is_zero() {
        let p = pt(41.8902, 12.4922);
        assert_eq!(distance_km(&p, &p), 0.0);
    }

    #[test]
    fn distance_known_value() {
        // Colosseum to Pantheon, roughly 1.6 km
        let colosseum = pt(41.8902, 12.4922);
        let pantheon = pt(41.8986, 12.4769);
        let d = distance_km(&colosseum, &pantheon);
        assert!(d > 1.4 && d < 1.8, "Expected ~1.6 km, got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (pt(0.0, 0.0), pt(0.0, 1.0)),
            (pt(48.2082, 16.3738), pt(48.1486, 17.1077)),
            (pt(-33.86, 151.21), pt(51.5, -0.12)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_km(&a, &b), distance_km(&b, &a));
        }
    }

    #[test]
    fn distance_never_negative_for_antipodes() {
        let d = distance_km(&pt(0.0, 0.0), &pt(0.0, 180.0));
        assert!(d > 20_000.0 && d.is_finite());
    }

    #[test]
    fn degree_radian_round_trip() {
        assert!((to_degrees(to_radians(123.456)) - 123.456).abs() < 1e-9);
        assert!((to_radians(180.0) - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn perpendicular_degenerate_segment_is_point_distance() {
        let p = pt(48.21, 16.37);
        let a = pt(48.20, 16.36);
        assert_eq!(perpendicular_distance_km(&p, &a, &a), distance_km(&p, &a));
    }

    #[test]
    fn perpendicular_point_on_segment_is_zero() {
        let d = perpendicular_distance_km(&pt(0.0, 0.5), &pt(0.0, 0.0), &pt(0.0, 1.0));
        assert!(d < 1e-9, "got {d}");
    }

    #[test]
    fn perpendicular_offset_from_midpoint() {
        // 0.001° north of an east-west segment at the equator, ~111 m
        let d = perpendicular_distance_km(&pt(0.001, 0.5), &pt(0.0, 0.0), &pt(0.0, 1.0));
        assert!((d - 0.111).abs() < 0.005, "got {d}");
    }

    #[test]
    fn perpendicular_clamps_beyond_endpoints() {
        let start = pt(0.0, 0.0);
        let end = pt(0.0, 0.01);
        let beyond = pt(0.0, 0.02);
        let d = perpendicular_distance_km(&beyond, &start, &end);
        assert!((d - distance_km(&beyond, &end)).abs() < 1e-9);
    }

    #[test]
    fn path_length_simple() {
        let path = vec![pt(0.0, 0.0), pt(0.0, 1.0), pt(0.0, 2.0)];
        let len = path_length_m(&path);
        assert!(len > 200_000.0 && len < 230_000.0, "Expected ~222 km, got {len:.0} m");
    }

    #[test]
    fn project_on_path_midpoint() {
        let path = vec![pt(48.0, 16.0), pt(48.0, 16.01)];
        let result = project_on_path(&pt(48.001, 16.005), &path).unwrap();
        assert!((result.point.lat - 48.0).abs() < 1e-6);
        assert!((result.point.lon - 16.005).abs() < 1e-6);
        assert_eq!(result.segment_index, 0);
        assert!(result.distance_m > 100.0 && result.distance_m < 120.0);
    }

    #[test]
    fn project_on_path_multi_segment() {
        let path = vec![pt(48.0, 16.0), pt(48.0, 16.01), pt(48.01, 16.01)];
        let result = project_on_path(&pt(48.005, 16.011), &path).unwrap();
        assert_eq!(result.segment_index, 1);
        assert!(result.distance_along_m > path_length_m(&path[..2]));
    }

    #[test]
    fn project_on_path_needs_two_points() {
        assert!(project_on_path(&pt(0.0, 0.0), &[pt(0.0, 0.0)]).is_none());
    }
}
