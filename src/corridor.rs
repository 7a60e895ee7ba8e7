//! Corridor pre-filtering of candidate sites.
//!
//! Keeps the sites lying within a fixed buffer of the straight line
//! between a tour's start and end, before the routing provider is
//! asked to thread a walking path through them.

use crate::geo::{perpendicular_distance_km, GeoPoint};
use crate::site::HistoricalSite;

/// Default half-width of the corridor in kilometers.
pub const DEFAULT_CORRIDOR_BUFFER_KM: f64 = 0.5;

/// Keep every candidate within `buffer_km` of the start-end segment.
///
/// The output preserves input order. When `start == end` the segment is
/// a single point and this becomes a radius filter around it, which is
/// the intended behavior for round-trip tours.
pub fn filter_along_corridor(
    start: &GeoPoint,
    end: &GeoPoint,
    candidates: Vec<HistoricalSite>,
    buffer_km: f64,
) -> Vec<HistoricalSite> {
    let total = candidates.len();
    let kept: Vec<HistoricalSite> = candidates
        .into_iter()
        .filter(|site| perpendicular_distance_km(&site.location, start, end) <= buffer_km)
        .collect();

    log::debug!(
        "corridor filter kept {}/{} sites within {:.2} km",
        kept.len(),
        total,
        buffer_km
    );
    kept
}
