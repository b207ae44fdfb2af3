//! Raw telemetry data model
//!
//! Defines what providers hand to the normalizer. Every field of a raw
//! sample is optional because recorded telemetry routinely has holes; the
//! normalizer filters unusable samples instead of failing.
//!
//! Coordinate system: planar track coordinates as recorded by the provider.
//! Units are whatever the provider uses (meters for the common sources).

use crate::error::ConfigError;
use crate::units::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one competing entity (e.g. a three-letter driver code)
pub type EntityId = String;

/// One recorded instant for one entity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// Provider time in seconds
    pub timestamp: Option<f64>,
}

impl RawSample {
    pub fn new(x: f64, y: f64, timestamp: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            timestamp: Some(timestamp),
        }
    }

    /// Position and timestamp, if every field is present and finite
    pub fn usable(&self) -> Option<(Point2, f64)> {
        match (self.x, self.y, self.timestamp) {
            (Some(x), Some(y), Some(t)) if x.is_finite() && y.is_finite() && t.is_finite() => {
                Some((Point2::new(x, y), t))
            }
            _ => None,
        }
    }
}

/// A per-lap run of samples as delivered by a provider
///
/// `samples` is `None` when the provider could not retrieve this lap.
/// `lap_time` is the official timing for the lap in seconds, when known.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LapRun {
    pub lap_number: u32,
    pub samples: Option<Vec<RawSample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lap_time: Option<f64>,
}

impl LapRun {
    pub fn new(lap_number: u32, samples: Vec<RawSample>) -> Self {
        Self {
            lap_number,
            samples: Some(samples),
            lap_time: None,
        }
    }

    pub fn unavailable(lap_number: u32) -> Self {
        Self {
            lap_number,
            samples: None,
            lap_time: None,
        }
    }

    pub fn with_lap_time(mut self, lap_time: f64) -> Self {
        self.lap_time = Some(lap_time);
        self
    }
}

/// Which part of a session gets replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Each entity's single fastest lap, all starting together
    FastestLap,
    /// Every lap of the session stitched into one continuous clock
    FullSession,
}

impl FromStr for ReplayMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fastest" | "fastest_lap" => Ok(ReplayMode::FastestLap),
            "race" | "full" | "full_session" => Ok(ReplayMode::FullSession),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayMode::FastestLap => write!(f, "fastest_lap"),
            ReplayMode::FullSession => write!(f, "full_session"),
        }
    }
}
