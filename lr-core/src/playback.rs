//! Playback controller
//!
//! Owns the virtual race clock of one replay session. An external timer
//! calls [`PlaybackController::tick`] at roughly `fps` Hz; user interaction
//! arrives as plain method calls between ticks. Every tick queries the
//! ranking engine exactly once, so a [`RenderRequest`] always describes a
//! single instant.

use crate::config::ReplayConfig;
use crate::error::{ConfigError, Result};
use crate::leaderboard::{RankingEngine, StandingsSnapshot};
use crate::model::EntityId;
use crate::series::SeriesSet;
use crate::units::{Point2, Seconds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mutable playback state, changed only through the controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_time: f64,
    pub speed_multiplier: f64,
    pub paused: bool,
    /// Absolute time applied on the next tick, then cleared
    pub scrub_override: Option<f64>,
}

impl PlaybackState {
    fn new(speed_multiplier: f64) -> Self {
        Self {
            current_time: 0.0,
            speed_multiplier,
            paused: false,
            scrub_override: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    Playing,
    Paused,
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub time: Seconds,
    pub positions: BTreeMap<EntityId, Point2>,
    pub snapshot: StandingsSnapshot,
    pub current_lap: u32,
    pub status: PlaybackStatus,
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trails: Option<BTreeMap<EntityId, Vec<Point2>>>,
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    series: SeriesSet,
    ranking: RankingEngine,
    state: PlaybackState,
    frame_interval: f64,
    min_speed: f64,
    max_speed: f64,
    show_trails: bool,
}

impl PlaybackController {
    /// Create a controller in the `Playing` state at time 0.
    pub fn new(series: SeriesSet, config: &ReplayConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            series,
            ranking: RankingEngine::new(config.meters_per_second)?,
            state: PlaybackState::new(config.initial_speed),
            frame_interval: config.frame_interval_secs(),
            min_speed: config.min_speed,
            max_speed: config.max_speed,
            show_trails: config.show_trails,
        })
    }

    pub fn series(&self) -> &SeriesSet {
        &self.series
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn status(&self) -> PlaybackStatus {
        if self.state.paused {
            PlaybackStatus::Paused
        } else {
            PlaybackStatus::Playing
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.state.paused
    }

    pub fn current_time(&self) -> f64 {
        self.state.current_time
    }

    pub fn speed(&self) -> f64 {
        self.state.speed_multiplier
    }

    /// Latest finish clock over all entities
    pub fn duration(&self) -> f64 {
        self.series.max_finish_clock()
    }

    /// Advance the clock by one frame and render.
    ///
    /// A pending scrub wins over normal advancement for this tick only, and
    /// applies whether or not playback is paused.
    pub fn tick(&mut self) -> RenderRequest {
        if let Some(target) = self.state.scrub_override.take() {
            self.state.current_time = target;
        } else if !self.state.paused {
            self.state.current_time += self.frame_interval * self.state.speed_multiplier;
        }
        self.render_at(self.state.current_time)
    }

    /// Render the current instant without advancing. A pending scrub is
    /// consumed so the result reflects it immediately.
    pub fn render(&mut self) -> RenderRequest {
        if let Some(target) = self.state.scrub_override.take() {
            self.state.current_time = target;
        }
        self.render_at(self.state.current_time)
    }

    /// Standings at an arbitrary time; does not touch playback state
    pub fn snapshot_at(&self, t: f64) -> StandingsSnapshot {
        self.ranking.snapshot(&self.series, t)
    }

    pub fn toggle_play_pause(&mut self) -> PlaybackStatus {
        self.state.paused = !self.state.paused;
        self.status()
    }

    pub fn play(&mut self) {
        self.state.paused = false;
    }

    pub fn pause(&mut self) {
        self.state.paused = true;
    }

    /// Set the speed multiplier, effective from the next tick.
    ///
    /// Non-positive or non-finite values are rejected and leave the current
    /// speed in place; anything else is clamped to the configured bounds.
    /// Returns the speed actually applied.
    pub fn set_speed(&mut self, multiplier: f64) -> Result<f64> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ConfigError::InvalidSpeed(multiplier));
        }
        self.state.speed_multiplier = multiplier.clamp(self.min_speed, self.max_speed);
        Ok(self.state.speed_multiplier)
    }

    /// Jump to an absolute time on the next tick (or render).
    pub fn scrub(&mut self, target_time: f64) -> Result<()> {
        if !target_time.is_finite() {
            return Err(ConfigError::InvalidScrubTime(target_time));
        }
        self.state.scrub_override = Some(target_time);
        Ok(())
    }

    fn render_at(&self, t: f64) -> RenderRequest {
        let snapshot = self.ranking.snapshot(&self.series, t);

        let positions = self
            .series
            .iter()
            .map(|(id, s)| (id.clone(), s.position_at(t)))
            .collect();

        let trails = self.show_trails.then(|| {
            self.series
                .iter()
                .map(|(id, s)| (id.clone(), s.trail_at(t).to_vec()))
                .collect()
        });

        RenderRequest {
            time: Seconds(t),
            positions,
            snapshot,
            current_lap: self.series.current_lap(t),
            status: self.status(),
            speed: self.state.speed_multiplier,
            trails,
        }
    }
}
