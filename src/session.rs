//! Live tour navigation.
//!
//! A [`NavigationSession`] follows the user's position along a planned
//! [`Route`] and plays each waypoint's announcement once, shortly after
//! the user comes within the trigger radius. Sessions are single-use:
//! `Idle -> Navigating -> Stopped`, and a stopped session never restarts.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::TourConfig;
use crate::geo::{distance_m, path_length_m, project_on_path, GeoPoint};
use crate::location::{
    Accuracy, PositionError, PositionSource, PositionUpdate, PositionWatch, Subscription,
    WatchOptions,
};
use crate::provider::{AudioPlayer, NarrationProvider};
use crate::route::{approach_announcement, Route};
use crate::site::SiteId;

/// Lifecycle of a navigation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Navigating,
    Stopped,
}

/// Navigation errors surfaced to the caller of [`NavigationSession::start`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavigationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    PositionUnavailable(String),

    #[error("session is already navigating")]
    AlreadyNavigating,

    #[error("session has been stopped")]
    SessionEnded,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    Started,
    /// Position projected onto the route path.
    Progress {
        distance_along_m: f64,
        distance_remaining_m: f64,
        off_route_m: f64,
    },
    /// The user came within range of a waypoint; its announcement is scheduled.
    WaypointReached { index: usize, site_id: SiteId },
    /// A waypoint's announcement is about to play.
    Announcing { index: usize, site_id: SiteId },
    /// A waypoint's announcement finished playing.
    Announced { index: usize, site_id: SiteId },
    /// A position error was absorbed; navigation continues.
    PositionUnavailable(String),
    Stopped,
}

/// Picks which waypoint to announce for a position.
///
/// Each waypoint triggers at most once per tracker.
#[derive(Debug, Clone)]
pub struct WaypointTracker {
    locations: Vec<GeoPoint>,
    trigger_radius_m: f64,
    visited: Vec<bool>,
    last_triggered: Option<usize>,
}

impl WaypointTracker {
    pub fn new(route: &Route, trigger_radius_m: f64) -> Self {
        let locations: Vec<GeoPoint> = route.waypoints.iter().map(|w| w.site.location).collect();
        Self {
            visited: vec![false; locations.len()],
            locations,
            trigger_radius_m,
            last_triggered: None,
        }
    }

    /// Nearest not-yet-triggered waypoint within the trigger radius.
    pub fn nearest_in_range(&self, position: &GeoPoint) -> Option<usize> {
        self.locations
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.visited[*i] && Some(*i) != self.last_triggered)
            .map(|(i, loc)| (i, distance_m(position, loc)))
            .filter(|(_, d)| *d <= self.trigger_radius_m)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    pub fn mark_triggered(&mut self, index: usize) {
        if let Some(v) = self.visited.get_mut(index) {
            *v = true;
            self.last_triggered = Some(index);
        }
    }

    pub fn last_triggered(&self) -> Option<usize> {
        self.last_triggered
    }

    pub fn is_visited(&self, index: usize) -> bool {
        self.visited.get(index).copied().unwrap_or(false)
    }
}

/// External services a session drives.
#[derive(Clone)]
pub struct NavigationServices {
    pub positions: Arc<dyn PositionSource>,
    pub narrator: Arc<dyn NarrationProvider>,
    pub player: Arc<dyn AudioPlayer>,
}

struct Pending {
    index: usize,
    handle: JoinHandle<()>,
}

struct Shared {
    state: SessionState,
    tracker: WaypointTracker,
    /// Scheduled announcement still inside its settling delay.
    pending: Option<Pending>,
    /// Announcement that has fired and may still be synthesizing or playing.
    active: Option<JoinHandle<()>>,
    intro: Option<JoinHandle<()>>,
}

struct Inner {
    route: Arc<Route>,
    path_length_m: f64,
    announce_delay: Duration,
    narrator: Arc<dyn NarrationProvider>,
    player: Arc<dyn AudioPlayer>,
    events: mpsc::UnboundedSender<NavigationEvent>,
    shared: Mutex<Shared>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: NavigationEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn on_position(self: &Arc<Self>, update: PositionUpdate) {
        let position = update.location;
        log::debug!("position {:.6},{:.6}", position.lat, position.lon);

        if let Some(p) = project_on_path(&position, &self.route.path) {
            self.emit(NavigationEvent::Progress {
                distance_along_m: p.distance_along_m,
                distance_remaining_m: (self.path_length_m - p.distance_along_m).max(0.0),
                off_route_m: p.distance_m,
            });
        }

        let mut shared = self.lock();
        if shared.state != SessionState::Navigating {
            return;
        }
        let Some(index) = shared.tracker.nearest_in_range(&position) else {
            return;
        };
        if shared.pending.as_ref().is_some_and(|p| p.index == index) {
            return;
        }

        if let Some(previous) = shared.pending.take() {
            log::debug!("replacing pending announcement for waypoint {}", previous.index);
            previous.handle.abort();
        }
        let handle = tokio::spawn(announce_after(Arc::clone(self), index));
        shared.pending = Some(Pending { index, handle });
        self.emit(NavigationEvent::WaypointReached {
            index,
            site_id: self.route.waypoints[index].site.id.clone(),
        });
    }
}

/// Fire the announcement for `index` once the settling delay passes.
async fn announce_after(inner: Arc<Inner>, index: usize) {
    tokio::time::sleep(inner.announce_delay).await;

    let waypoint = {
        let mut shared = inner.lock();
        if shared.state != SessionState::Navigating {
            return;
        }
        match shared.pending.take() {
            Some(p) if p.index == index => {
                if let Some(previous) = shared.active.replace(p.handle) {
                    if !previous.is_finished() {
                        previous.abort();
                        inner.player.stop();
                    }
                }
            }
            other => {
                shared.pending = other;
                return;
            }
        }
        shared.tracker.mark_triggered(index);
        inner.route.waypoints[index].clone()
    };

    log::info!("announcing waypoint {} ({})", index, waypoint.site.title);
    inner.emit(NavigationEvent::Announcing {
        index,
        site_id: waypoint.site.id.clone(),
    });

    let audio = match waypoint.narration_audio {
        Some(audio) => Some(audio),
        None => match inner.narrator.synthesize(&approach_announcement(&waypoint.site)).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                log::warn!("on-the-fly narration for {} failed: {e}", waypoint.site.id);
                None
            }
        },
    };

    if let Some(audio) = audio {
        if inner.lock().state != SessionState::Navigating {
            return;
        }
        match inner.player.play(&audio).await {
            Ok(()) => inner.emit(NavigationEvent::Announced {
                index,
                site_id: waypoint.site.id,
            }),
            Err(e) => log::warn!("playback of {audio} failed: {e}"),
        }
    }
}

async fn play_intro(inner: Arc<Inner>) {
    let text = inner.route.summary_announcement();
    match inner.narrator.synthesize(&text).await {
        Ok(audio) => {
            if let Err(e) = inner.player.play(&audio).await {
                log::warn!("intro playback failed: {e}");
            }
        }
        Err(e) => log::warn!("intro narration failed: {e}"),
    }
}

async fn listen(
    inner: Arc<Inner>,
    mut updates: mpsc::Receiver<Result<PositionUpdate, PositionError>>,
) {
    while let Some(update) = updates.recv().await {
        match update {
            Ok(update) => inner.on_position(update),
            Err(e) => {
                log::warn!("position update failed, continuing: {e}");
                inner.emit(NavigationEvent::PositionUnavailable(e.to_string()));
            }
        }
    }
    log::warn!("position stream closed; waiting without updates");
}

/// Navigation over one planned route.
pub struct NavigationSession {
    inner: Arc<Inner>,
    positions: Arc<dyn PositionSource>,
    watch_options: WatchOptions,
    subscription: Option<Box<dyn Subscription>>,
    listener: Option<JoinHandle<()>>,
    events: Option<mpsc::UnboundedReceiver<NavigationEvent>>,
}

impl NavigationSession {
    /// Create an idle session for `route`.
    pub fn new(route: Arc<Route>, services: NavigationServices, config: &TourConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracker = WaypointTracker::new(&route, config.trigger_radius_m);

        let inner = Arc::new(Inner {
            path_length_m: path_length_m(&route.path),
            route,
            announce_delay: config.announce_delay(),
            narrator: services.narrator,
            player: services.player,
            events: tx,
            shared: Mutex::new(Shared {
                state: SessionState::Idle,
                tracker,
                pending: None,
                active: None,
                intro: None,
            }),
        });

        Self {
            inner,
            positions: services.positions,
            watch_options: WatchOptions {
                accuracy: Accuracy::High,
                distance_interval_m: config.position_interval_m,
            },
            subscription: None,
            listener: None,
            events: Some(rx),
        }
    }

    /// Create a session and start navigating immediately.
    pub async fn begin(
        route: Arc<Route>,
        services: NavigationServices,
        config: &TourConfig,
    ) -> Result<Self, NavigationError> {
        let mut session = Self::new(route, services, config);
        session.start().await?;
        Ok(session)
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<NavigationEvent>> {
        self.events.take()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn route(&self) -> &Route {
        &self.inner.route
    }

    /// Site of the most recently announced waypoint.
    pub fn last_triggered(&self) -> Option<SiteId> {
        let index = self.inner.lock().tracker.last_triggered()?;
        Some(self.inner.route.waypoints[index].site.id.clone())
    }

    /// Subscribe to live positions and start announcing.
    ///
    /// On permission denial the session stays `Idle`.
    pub async fn start(&mut self) -> Result<(), NavigationError> {
        match self.state() {
            SessionState::Idle => {}
            SessionState::Navigating => return Err(NavigationError::AlreadyNavigating),
            SessionState::Stopped => return Err(NavigationError::SessionEnded),
        }

        let PositionWatch {
            updates,
            subscription,
        } = self
            .positions
            .watch(self.watch_options)
            .await
            .map_err(|e| match e {
                PositionError::PermissionDenied => NavigationError::PermissionDenied,
                PositionError::Unavailable(m) => NavigationError::PositionUnavailable(m),
            })?;
        self.subscription = Some(subscription);

        {
            let mut shared = self.inner.lock();
            shared.state = SessionState::Navigating;
            shared.intro = Some(tokio::spawn(play_intro(Arc::clone(&self.inner))));
        }
        self.listener = Some(tokio::spawn(listen(Arc::clone(&self.inner), updates)));

        log::info!(
            "navigation started: {} waypoints, {:.0} m",
            self.inner.route.waypoints.len(),
            self.inner.route.total_distance_m
        );
        self.inner.emit(NavigationEvent::Started);
        Ok(())
    }

    /// Stop navigating and release the subscription and audio.
    ///
    /// Idempotent: stopping a stopped session does nothing.
    pub fn stop(&mut self) {
        let (was, tasks) = {
            let mut shared = self.inner.lock();
            let was = shared.state;
            if was == SessionState::Stopped {
                return;
            }
            shared.state = SessionState::Stopped;
            let tasks = [
                shared.pending.take().map(|p| p.handle),
                shared.active.take(),
                shared.intro.take(),
            ];
            (was, tasks)
        };

        for task in tasks.into_iter().flatten() {
            task.abort();
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Some(mut subscription) = self.subscription.take() {
            subscription.remove();
        }

        if was == SessionState::Navigating {
            self.inner.player.stop();
            log::info!("navigation stopped");
            self.inner.emit(NavigationEvent::Stopped);
        }
    }
}

impl Drop for NavigationSession {
    fn drop(&mut self) {
        self.stop();
    }
}
