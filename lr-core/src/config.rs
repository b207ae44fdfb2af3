//! Replay configuration
//!
//! The lap gap threshold and the distance-per-second ratio are track and
//! sampling-rate specific heuristics. They are configurable rather than
//! hard-coded so a session recorded at a different rate can be tuned.

use crate::error::{ConfigError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_LAP_GAP_THRESHOLD: f64 = 20.0;
pub const DEFAULT_METERS_PER_SECOND: f64 = 80.0;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_MIN_SPEED: f64 = 0.25;
pub const DEFAULT_MAX_SPEED: f64 = 3.0;
pub const DEFAULT_TRACK_MARGIN: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Clock gap between consecutive samples that marks a new lap
    pub lap_gap_threshold: f64,

    /// Distance covered per second when converting a distance deficit to a
    /// time gap
    pub meters_per_second: f64,

    /// Tick frequency of the playback loop
    pub fps: u32,

    pub min_speed: f64,
    pub max_speed: f64,
    pub initial_speed: f64,

    /// Include each entity's path so far in every render request
    pub show_trails: bool,

    /// Padding added around the track outline's bounding box
    pub track_margin: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            lap_gap_threshold: DEFAULT_LAP_GAP_THRESHOLD,
            meters_per_second: DEFAULT_METERS_PER_SECOND,
            fps: DEFAULT_FPS,
            min_speed: DEFAULT_MIN_SPEED,
            max_speed: DEFAULT_MAX_SPEED,
            initial_speed: 1.0,
            show_trails: false,
            track_margin: DEFAULT_TRACK_MARGIN,
        }
    }
}

impl ReplayConfig {
    /// Load a configuration from a JSON file. Missing keys fall back to
    /// their defaults; the result is validated before it is returned.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ReplayConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        positive("lap_gap_threshold", self.lap_gap_threshold)?;
        positive("meters_per_second", self.meters_per_second)?;
        if self.fps == 0 {
            return Err(ConfigError::InvalidFps(self.fps));
        }
        if !self.track_margin.is_finite() || self.track_margin < 0.0 {
            return Err(ConfigError::InvalidThreshold {
                name: "track_margin",
                value: self.track_margin,
            });
        }

        let bounds_ok = self.min_speed.is_finite()
            && self.max_speed.is_finite()
            && self.min_speed > 0.0
            && self.min_speed <= self.max_speed
            && (self.min_speed..=self.max_speed).contains(&self.initial_speed);
        if !bounds_ok {
            return Err(ConfigError::InvalidSpeedBounds {
                min: self.min_speed,
                max: self.max_speed,
                initial: self.initial_speed,
            });
        }

        Ok(())
    }

    /// Duration of one tick at normal speed
    pub fn frame_interval_secs(&self) -> f64 {
        1.0 / self.fps as f64
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}
