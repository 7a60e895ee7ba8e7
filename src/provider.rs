//! Ports to the external routing, narration and audio services.
//!
//! The concrete HTTP protocols belong to the providers; these traits are
//! only the surface the planner and navigation session consume.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Travel mode requested from the routing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Walking,
    Bicycling,
    Driving,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Walking => "walking",
            TravelMode::Bicycling => "bicycling",
            TravelMode::Driving => "driving",
        }
    }
}

/// A directions request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteQuery {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub waypoints: Vec<GeoPoint>,
    pub mode: TravelMode,
    /// Let the provider reorder `waypoints` for the shortest tour.
    pub optimize: bool,
}

/// Outcome reported in the provider payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteStatus {
    Ok,
    Rejected {
        status: String,
        message: Option<String>,
    },
}

/// One step of a leg, as the provider reports it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Step {
    /// Encoded polyline of the step geometry.
    pub polyline: String,
    pub html_instructions: String,
    pub distance_m: f64,
    pub duration_s: f64,
    pub maneuver: Option<String>,
}

/// The part of a route between two consecutive stops.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Leg {
    pub distance_m: f64,
    pub duration_s: f64,
    pub steps: Vec<Step>,
}

/// A directions response.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub status: RouteStatus,
    pub legs: Vec<Leg>,
    /// Permutation of the request's waypoint indices in visiting order.
    pub waypoint_order: Vec<usize>,
}

/// Failures reaching or reading the routing provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Directions service that produces walking paths.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn route(&self, query: &RouteQuery) -> Result<RouteResponse, ProviderError>;
}

/// Opaque handle to synthesized audio (a file path, URL or cache key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioRef(pub String);

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Narration or playback failure. Never surfaced past the core.
#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("playback failed: {0}")]
    Playback(String),
}

/// Text-to-speech service.
#[async_trait]
pub trait NarrationProvider: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioRef, NarrationError>;
}

/// Audio output owned by a navigation session.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play `audio`, replacing anything currently playing.
    async fn play(&self, audio: &AudioRef) -> Result<(), NarrationError>;

    /// Stop and release whatever is playing.
    fn stop(&self);
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Recording test doubles for the provider ports.

    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    use super::*;

    /// Routing provider that replays canned results and records queries.
    #[derive(Default)]
    pub struct ScriptedRouter {
        pub responses: Mutex<VecDeque<Result<RouteResponse, ProviderError>>>,
        pub queries: Mutex<Vec<RouteQuery>>,
    }

    impl ScriptedRouter {
        pub fn new(responses: Vec<Result<RouteResponse, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                queries: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RoutingProvider for ScriptedRouter {
        async fn route(&self, query: &RouteQuery) -> Result<RouteResponse, ProviderError> {
            self.queries.lock().unwrap().push(query.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Transport("no scripted response".into())))
        }
    }

    /// Narrator that returns `audio:<text>` and fails for texts containing
    /// any of the `fail_on` fragments.
    #[derive(Default)]
    pub struct FakeNarrator {
        pub fail_on: HashSet<String>,
        pub texts: Mutex<Vec<String>>,
    }

    impl FakeNarrator {
        pub fn failing_on(fragments: &[&str]) -> Self {
            Self {
                fail_on: fragments.iter().map(|f| f.to_string()).collect(),
                texts: Mutex::new(Vec::new()),
            }
        }

        pub fn texts(&self) -> Vec<String> {
            self.texts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NarrationProvider for FakeNarrator {
        async fn synthesize(&self, text: &str) -> Result<AudioRef, NarrationError> {
            self.texts.lock().unwrap().push(text.to_string());
            if self.fail_on.iter().any(|f| text.contains(f.as_str())) {
                return Err(NarrationError::Synthesis("voice unavailable".into()));
            }
            Ok(AudioRef(format!("audio:{text}")))
        }
    }

    /// Player that records what it was asked to play.
    #[derive(Default)]
    pub struct RecordingPlayer {
        pub played: Mutex<Vec<AudioRef>>,
        pub stops: Mutex<usize>,
        /// How long each clip keeps playing.
        pub hold: std::time::Duration,
    }

    impl RecordingPlayer {
        pub fn holding(hold: std::time::Duration) -> Self {
            Self {
                hold,
                ..Self::default()
            }
        }

        pub fn played(&self) -> Vec<AudioRef> {
            self.played.lock().unwrap().clone()
        }

        pub fn stops(&self) -> usize {
            *self.stops.lock().unwrap()
        }
    }

    #[async_trait]
    impl AudioPlayer for RecordingPlayer {
        async fn play(&self, audio: &AudioRef) -> Result<(), NarrationError> {
            self.played.lock().unwrap().push(audio.clone());
            tokio::time::sleep(self.hold).await;
            Ok(())
        }

        fn stop(&self) {
            *self.stops.lock().unwrap() += 1;
        }
    }
}
