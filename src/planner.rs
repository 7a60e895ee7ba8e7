//! Tour planning.
//!
//! Turns a start, an end and a set of story categories into a [`Route`]:
//! sites are fetched broadly and filtered locally (category, then
//! corridor), the routing provider threads a walking path through the
//! survivors, and each stop gets its announcement synthesized up front.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;

use crate::config::TourConfig;
use crate::corridor::filter_along_corridor;
use crate::geo::GeoPoint;
use crate::polyline::decode_polyline;
use crate::provider::{
    Leg, NarrationProvider, ProviderError, RouteQuery, RouteResponse, RouteStatus,
    RoutingProvider,
};
use crate::route::{approach_announcement, Instruction, Route, Waypoint};
use crate::site::{HistoricalSite, PointRepository, RepositoryError};

/// A request for a tour between two points.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// Story categories to visit; `"all"` selects every site.
    pub categories: BTreeSet<String>,
}

impl RouteRequest {
    pub fn new<I, S>(start: GeoPoint, end: GeoPoint, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            start,
            end,
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }
}

/// Coarse category of a [`RoutingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingErrorKind {
    NoCandidatePoints,
    ProviderUnavailable,
    ProviderRejected,
    NoPath,
    Repository,
}

/// Route planning errors.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("no candidate sites to plan a tour from")]
    NoCandidatePoints,

    #[error("routing provider unavailable: {0}")]
    ProviderUnavailable(#[source] ProviderError),

    #[error("routing provider rejected the request ({status})")]
    ProviderRejected {
        status: String,
        message: Option<String>,
    },

    #[error("routing provider returned no path")]
    NoPath,

    #[error("site repository failed: {0}")]
    Repository(#[from] RepositoryError),
}

impl RoutingError {
    pub fn kind(&self) -> RoutingErrorKind {
        match self {
            RoutingError::NoCandidatePoints => RoutingErrorKind::NoCandidatePoints,
            RoutingError::ProviderUnavailable(_) => RoutingErrorKind::ProviderUnavailable,
            RoutingError::ProviderRejected { .. } => RoutingErrorKind::ProviderRejected,
            RoutingError::NoPath => RoutingErrorKind::NoPath,
            RoutingError::Repository(_) => RoutingErrorKind::Repository,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RoutingError::ProviderUnavailable(_)
                | RoutingError::Repository(RepositoryError::Unavailable(_))
        )
    }
}

/// Builds tours from the site repository and external providers.
pub struct RoutePlanner {
    sites: Arc<dyn PointRepository>,
    router: Arc<dyn RoutingProvider>,
    narrator: Arc<dyn NarrationProvider>,
    config: TourConfig,
}

impl RoutePlanner {
    pub fn new(
        sites: Arc<dyn PointRepository>,
        router: Arc<dyn RoutingProvider>,
        narrator: Arc<dyn NarrationProvider>,
        config: TourConfig,
    ) -> Self {
        Self {
            sites,
            router,
            narrator,
            config,
        }
    }

    pub fn config(&self) -> &TourConfig {
        &self.config
    }

    /// Plan a tour.
    ///
    /// A category set that matches no site is not an error: the result is
    /// a direct route with zero stops. Narration failures only leave the
    /// affected waypoint without audio.
    pub async fn plan_route(&self, request: &RouteRequest) -> Result<Route, RoutingError> {
        if request.categories.is_empty() {
            return Err(RoutingError::NoCandidatePoints);
        }

        let sites = self.sites.list_all_sites().await?;
        if sites.is_empty() {
            return Err(RoutingError::NoCandidatePoints);
        }
        let total = sites.len();

        let matching: Vec<HistoricalSite> = sites
            .into_iter()
            .filter(|s| s.matches_categories(&request.categories))
            .collect();
        log::debug!(
            "category filter kept {}/{} sites for {:?}",
            matching.len(),
            total,
            request.categories
        );

        let stops = filter_along_corridor(
            &request.start,
            &request.end,
            matching,
            self.config.corridor_buffer_km,
        );

        let query = RouteQuery {
            origin: request.start,
            destination: request.end,
            waypoints: stops.iter().map(|s| s.location).collect(),
            mode: self.config.travel_mode,
            optimize: self.config.optimize_waypoints,
        };
        let response = self.request_route(&query).await?;

        if let RouteStatus::Rejected { status, message } = response.status {
            log::warn!("routing provider rejected tour: {status} {message:?}");
            return Err(RoutingError::ProviderRejected { status, message });
        }
        if response.legs.is_empty() {
            return Err(RoutingError::NoPath);
        }

        let (path, steps) = assemble_path(&response.legs);
        let order = visiting_order(&response.waypoint_order, stops.len());
        let waypoints = self.narrate(reorder(stops, &order)).await;

        let total_distance_m: f64 = response.legs.iter().map(|l| l.distance_m).sum();
        let total_duration_s: f64 = response.legs.iter().map(|l| l.duration_s).sum();

        log::info!(
            "planned tour: {} stops, {:.0} m, {:.0} s, {} path points",
            waypoints.len(),
            total_distance_m,
            total_duration_s,
            path.len()
        );

        Ok(Route {
            start: request.start,
            end: request.end,
            path,
            waypoints,
            steps,
            total_distance_m,
            total_duration_s,
            requested_categories: request.categories.clone(),
        })
    }

    /// Call the routing provider, retrying transport failures with backoff.
    async fn request_route(&self, query: &RouteQuery) -> Result<RouteResponse, RoutingError> {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.router.route(query).await {
                Ok(response) => return Ok(response),
                Err(ProviderError::Malformed(message)) => {
                    return Err(RoutingError::ProviderRejected {
                        status: "MALFORMED_RESPONSE".to_string(),
                        message: Some(message),
                    });
                }
                Err(err) if attempt >= max_attempts => {
                    log::warn!("routing provider failed after {attempt} attempts: {err}");
                    return Err(RoutingError::ProviderUnavailable(err));
                }
                Err(err) => {
                    let wait = policy.backoff(attempt - 1);
                    log::warn!(
                        "routing attempt {attempt}/{max_attempts} failed: {err}; retrying in {wait:?}"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Synthesize every waypoint's announcement concurrently.
    async fn narrate(&self, sites: Vec<HistoricalSite>) -> Vec<Waypoint> {
        let texts: Vec<String> = sites.iter().map(approach_announcement).collect();
        let results = join_all(texts.iter().map(|t| self.narrator.synthesize(t))).await;

        sites
            .into_iter()
            .zip(results)
            .enumerate()
            .map(|(order, (site, audio))| {
                let narration_audio = match audio {
                    Ok(audio) => Some(audio),
                    Err(e) => {
                        log::warn!("no narration for site {}: {e}", site.id);
                        None
                    }
                };
                Waypoint {
                    site,
                    narration_audio,
                    order,
                }
            })
            .collect()
    }
}

/// Concatenate step geometry into one path and collect instructions.
///
/// A step's first point is dropped when it repeats the path's last point.
fn assemble_path(legs: &[Leg]) -> (Vec<GeoPoint>, Vec<Instruction>) {
    let mut path: Vec<GeoPoint> = Vec::new();
    let mut steps = Vec::new();

    for step in legs.iter().flat_map(|leg| leg.steps.iter()) {
        let decoded = decode_polyline(&step.polyline);
        let skip = usize::from(path.last().is_some() && path.last() == decoded.first());
        path.extend(decoded.into_iter().skip(skip));

        steps.push(Instruction::from_step(
            &step.html_instructions,
            step.distance_m,
            step.duration_s,
            step.maneuver.as_deref(),
        ));
    }

    (path, steps)
}

/// Validate the provider's waypoint order, falling back to input order.
fn visiting_order(provider_order: &[usize], count: usize) -> Vec<usize> {
    let identity = || (0..count).collect::<Vec<_>>();

    if provider_order.is_empty() {
        return identity();
    }
    if provider_order.len() != count {
        log::warn!(
            "waypoint order has {} entries for {count} stops; keeping input order",
            provider_order.len()
        );
        return identity();
    }

    let mut seen = vec![false; count];
    for &i in provider_order {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                log::warn!("waypoint order {provider_order:?} is not a permutation; keeping input order");
                return identity();
            }
        }
    }
    provider_order.to_vec()
}

fn reorder(sites: Vec<HistoricalSite>, order: &[usize]) -> Vec<HistoricalSite> {
    let mut slots: Vec<Option<HistoricalSite>> = sites.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots.get_mut(i).and_then(Option::take)).collect()
}
