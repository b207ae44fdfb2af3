//! Configuration errors
//!
//! Data sparsity never surfaces here: missing telemetry and out-of-range
//! queries are modeled as data states. Only malformed configuration inputs
//! are rejected, and the receiver leaves its prior state untouched.

use thiserror::Error;

/// Result alias for operations that can reject configuration input
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("playback speed must be a positive finite number, got {0}")]
    InvalidSpeed(f64),

    #[error("unknown replay mode '{0}' (expected 'fastest' or 'race')")]
    InvalidMode(String),

    #[error("scrub target must be a finite time, got {0}")]
    InvalidScrubTime(f64),

    #[error("frame rate must be at least 1 fps, got {0}")]
    InvalidFps(u32),

    #[error("{name} must be a positive finite number, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("speed bounds are inconsistent: min {min}, max {max}, initial {initial}")]
    InvalidSpeedBounds { min: f64, max: f64, initial: f64 },
}
