//! LapReplay Core Library
//!
//! This crate provides the telemetry normalizer, the leaderboard ranking
//! engine and the playback controller for replaying recorded races.

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod model;
pub mod normalize;
pub mod playback;
pub mod provider;
pub mod series;
pub mod units;

pub use config::ReplayConfig;
pub use error::ConfigError;
pub use leaderboard::{GapDescriptor, RankingEngine, Standing, StandingsSnapshot};
pub use model::{EntityId, LapRun, RawSample, ReplayMode};
pub use normalize::Normalizer;
pub use playback::{PlaybackController, PlaybackState, PlaybackStatus, RenderRequest};
pub use provider::{load_series, LoadedSeries, TelemetryProvider};
pub use series::{EntitySeries, SeriesSet};
