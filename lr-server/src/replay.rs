//! Replay session state
//!
//! A replay session owns the normalized series of every selected entity
//! and the playback controller that walks them, plus the metadata the API
//! reports about where the data came from.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use lr_core::units::{Bounds, Point2, Seconds};
use lr_core::{
    load_series, EntityId, Normalizer, PlaybackController, PlaybackStatus, ReplayConfig,
    ReplayMode, TelemetryProvider,
};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use tracing::{info, warn};

/// Which entities of a provider to replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSelection {
    All,
    Only(Vec<EntityId>),
}

impl DriverSelection {
    /// Entities to request from a provider offering `available`.
    ///
    /// An explicit selection is passed through as-is; ids the provider does
    /// not know end up excluded like any entity without data.
    pub fn resolve(&self, available: &[EntityId]) -> Vec<EntityId> {
        match self {
            DriverSelection::All => available.to_vec(),
            DriverSelection::Only(ids) => ids.clone(),
        }
    }
}

impl FromStr for DriverSelection {
    type Err = String;

    /// `ALL` (any case) or a comma-separated list such as `VER,NOR`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(DriverSelection::All);
        }

        let mut ids: Vec<EntityId> = Vec::new();
        for id in s.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            let id = id.to_uppercase();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        if ids.is_empty() {
            Err(format!("no drivers in '{}' (use ALL or a list like VER,NOR)", s))
        } else {
            Ok(DriverSelection::Only(ids))
        }
    }
}

impl fmt::Display for DriverSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverSelection::All => f.write_str("ALL"),
            DriverSelection::Only(ids) => f.write_str(&ids.join(",")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInfo {
    pub id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

/// State for an active replay session
pub struct ReplaySession {
    controller: PlaybackController,
    name: String,
    mode: ReplayMode,
    fps: u32,
    entities: Vec<EntityInfo>,
    excluded: Vec<EntityId>,
    replay_id: String,
    track_outline: Vec<Point2>,
    bounds: Option<Bounds>,
    loaded_at: DateTime<Utc>,
}

impl ReplaySession {
    /// Fetch and normalize the selected entities, then set up playback.
    ///
    /// Fails when no selected entity has usable telemetry.
    pub fn load(
        provider: &dyn TelemetryProvider,
        selection: &DriverSelection,
        mode: ReplayMode,
        config: &ReplayConfig,
    ) -> Result<Self> {
        config.validate()?;

        let requested = selection.resolve(&provider.entities());
        let normalizer = Normalizer::from_config(config)?;
        let loaded = load_series(provider, &requested, mode, &normalizer);

        if loaded.series.is_empty() {
            bail!(
                "No usable telemetry for any of {} entities from {}",
                requested.len(),
                provider.name()
            );
        }

        let entities: Vec<EntityInfo> = loaded
            .series
            .ids()
            .map(|id| EntityInfo {
                id: id.clone(),
                team: provider.team(id),
            })
            .collect();

        // Stable replay ID from what was loaded
        let mut hasher = DefaultHasher::new();
        provider.name().hash(&mut hasher);
        mode.hash(&mut hasher);
        for (id, series) in loaded.series.iter() {
            id.hash(&mut hasher);
            series.len().hash(&mut hasher);
            series.finish_clock().to_bits().hash(&mut hasher);
        }
        let replay_id = format!("{:016x}", hasher.finish());

        let track_outline = match loaded.series.ids().next() {
            Some(reference) => track_outline(provider, reference, &normalizer),
            None => Vec::new(),
        };
        let bounds = Bounds::around(&track_outline, config.track_margin);

        let controller = PlaybackController::new(loaded.series, config)?;

        info!(
            "Loaded replay '{}' ({}): {} entities, {:.1}s",
            provider.name(),
            mode,
            entities.len(),
            controller.duration()
        );

        Ok(ReplaySession {
            controller,
            name: provider.name().to_string(),
            mode,
            fps: config.fps,
            entities,
            excluded: loaded.excluded,
            replay_id,
            track_outline,
            bounds,
            loaded_at: Utc::now(),
        })
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ReplayMode {
        self.mode
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn excluded(&self) -> &[EntityId] {
        &self.excluded
    }

    pub fn replay_id(&self) -> &str {
        &self.replay_id
    }

    pub fn track_outline(&self) -> &[Point2] {
        &self.track_outline
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn info(&self) -> ReplayInfo {
        let controller = &self.controller;
        let state = controller.state();
        ReplayInfo {
            replay_id: self.replay_id.clone(),
            name: self.name.clone(),
            mode: self.mode,
            entities: self.entities.clone(),
            excluded: self.excluded.clone(),
            duration: Seconds(controller.duration()),
            current_time: Seconds(state.current_time),
            current_lap: controller.series().current_lap(state.current_time),
            status: controller.status(),
            speed: state.speed_multiplier,
            pending_scrub: state.scrub_override.map(Seconds),
            fps: self.fps,
            track_outline: self.track_outline.clone(),
            bounds: self.bounds,
            loaded_at: self.loaded_at,
        }
    }
}

/// Path of `entity`'s fastest lap, drawn as the track reference.
/// Empty when that lap cannot be fetched.
fn track_outline(
    provider: &dyn TelemetryProvider,
    entity: &str,
    normalizer: &Normalizer,
) -> Vec<Point2> {
    match provider.fetch_samples(entity, ReplayMode::FastestLap) {
        Ok(Some(runs)) => normalizer
            .normalize(&runs, ReplayMode::FastestLap)
            .map(|series| series.positions().to_vec())
            .unwrap_or_default(),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("No track outline from {}: {:#}", entity, e);
            Vec::new()
        }
    }
}

/// Serializable replay info for the API
#[derive(Debug, Clone, Serialize)]
pub struct ReplayInfo {
    pub replay_id: String,
    pub name: String,
    pub mode: ReplayMode,
    pub entities: Vec<EntityInfo>,
    pub excluded: Vec<EntityId>,
    pub duration: Seconds,
    pub current_time: Seconds,
    pub current_lap: u32,
    pub status: PlaybackStatus,
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_scrub: Option<Seconds>,
    pub fps: u32,
    pub track_outline: Vec<Point2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    pub loaded_at: DateTime<Utc>,
}
