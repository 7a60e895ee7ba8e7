//! Tour tuning parameters.
//!
//! Hosts pass these as JSON; every field has a default so an empty
//! object yields the stock walking-tour behavior.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::corridor::DEFAULT_CORRIDOR_BUFFER_KM;
use crate::provider::TravelMode;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("retry.max_attempts must be at least 1")]
    NoAttempts,
}

/// Retry strategy for routing-provider calls.
///
/// Only transport-level failures are retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first (must be >= 1).
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    /// Backoff cap.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry_index` (0 for the first retry).
    ///
    /// Doubles from the initial backoff, capped at `max_backoff_ms`.
    pub fn backoff(&self, retry_index: usize) -> Duration {
        let cap = self.max_backoff_ms.max(self.initial_backoff_ms);
        let shift = retry_index.min(20) as u32;
        let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor).min(cap))
    }
}

/// Tour planning and navigation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    /// Half-width of the start-end corridor for candidate sites.
    pub corridor_buffer_km: f64,
    /// Distance at which an approaching waypoint is announced.
    pub trigger_radius_m: f64,
    /// Settling delay before an announcement plays.
    pub announce_delay_ms: u64,
    /// Minimum movement between position reports.
    pub position_interval_m: f64,
    pub travel_mode: TravelMode,
    pub optimize_waypoints: bool,
    pub retry: RetryPolicy,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            corridor_buffer_km: DEFAULT_CORRIDOR_BUFFER_KM,
            trigger_radius_m: 50.0,
            announce_delay_ms: 1_000,
            position_interval_m: 10.0,
            travel_mode: TravelMode::Walking,
            optimize_waypoints: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl TourConfig {
    /// Parse and validate a JSON config object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TourConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("corridor_buffer_km", self.corridor_buffer_km),
            ("trigger_radius_m", self.trigger_radius_m),
            ("position_interval_m", self.position_interval_m),
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        Ok(())
    }

    pub fn announce_delay(&self) -> Duration {
        Duration::from_millis(self.announce_delay_ms)
    }
}
