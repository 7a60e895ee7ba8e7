//! Live position port.
//!
//! The host platform owns the GPS. The core asks it for a continuous
//! subscription and reads updates from a channel until it releases the
//! subscription.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::geo::GeoPoint;

/// Requested fix quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accuracy {
    #[default]
    High,
    Balanced,
    Low,
}

/// Subscription parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub accuracy: Accuracy,
    /// Report only after moving at least this far.
    pub distance_interval_m: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::High,
            distance_interval_m: 10.0,
        }
    }
}

/// A single position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionUpdate {
    pub location: GeoPoint,
    /// Horizontal accuracy radius in meters, if reported.
    pub accuracy_m: Option<f64>,
}

impl PositionUpdate {
    pub fn at(location: GeoPoint) -> Self {
        Self {
            location,
            accuracy_m: None,
        }
    }
}

/// Position access failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location temporarily unavailable: {0}")]
    Unavailable(String),
}

/// Releases a platform position subscription.
pub trait Subscription: Send {
    fn remove(&mut self);
}

/// An open position subscription.
pub struct PositionWatch {
    /// Fixes and transient errors, in delivery order.
    pub updates: mpsc::Receiver<Result<PositionUpdate, PositionError>>,
    pub subscription: Box<dyn Subscription>,
}

/// Platform location service.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Open a continuous subscription.
    ///
    /// Fails with [`PositionError::PermissionDenied`] when the user has
    /// not granted location access.
    async fn watch(&self, options: WatchOptions) -> Result<PositionWatch, PositionError>;
}
