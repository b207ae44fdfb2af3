//! Normalized per-entity time series
//!
//! An [`EntitySeries`] is built once by the normalizer and is read-only
//! afterwards. All lookups are binary searches over the zero-based clock.

use crate::model::EntityId;
use crate::units::{Meters, Point2, Seconds};

/// One entity's replayable track
///
/// Invariants (established by the normalizer):
/// - `clock` is non-decreasing and `clock[0] == 0.0`
/// - `positions` and `cumulative_distance` are index-aligned with `clock`
/// - `cumulative_distance` is non-decreasing and starts at 0
/// - `lap_starts` is strictly increasing and starts with 0.0
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySeries {
    clock: Vec<f64>,
    positions: Vec<Point2>,
    cumulative_distance: Vec<f64>,
    lap_starts: Vec<f64>,
}

impl EntitySeries {
    /// Assemble a series from already-normalized columns.
    ///
    /// Callers outside the normalizer must uphold the type invariants; the
    /// columns are checked in debug builds only.
    pub(crate) fn from_parts(
        clock: Vec<f64>,
        positions: Vec<Point2>,
        cumulative_distance: Vec<f64>,
        lap_starts: Vec<f64>,
    ) -> Self {
        debug_assert!(!clock.is_empty());
        debug_assert_eq!(clock.len(), positions.len());
        debug_assert_eq!(clock.len(), cumulative_distance.len());
        debug_assert_eq!(lap_starts.first(), Some(&0.0));

        Self {
            clock,
            positions,
            cumulative_distance,
            lap_starts,
        }
    }

    pub fn clock(&self) -> &[f64] {
        &self.clock
    }

    pub fn positions(&self) -> &[Point2] {
        &self.positions
    }

    pub fn cumulative_distance(&self) -> &[f64] {
        &self.cumulative_distance
    }

    pub fn lap_starts(&self) -> &[f64] {
        &self.lap_starts
    }

    pub fn len(&self) -> usize {
        self.clock.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clock.is_empty()
    }

    /// The entity's last known race time
    pub fn finish_clock(&self) -> f64 {
        self.clock[self.clock.len() - 1]
    }

    /// Greatest index whose clock value is `<= t`.
    ///
    /// Queries before the first sample clamp to 0, queries past the finish
    /// clamp to the last index.
    pub fn index_at(&self, t: f64) -> usize {
        self.clock.partition_point(|&c| c <= t).saturating_sub(1)
    }

    pub fn position_at(&self, t: f64) -> Point2 {
        self.positions[self.index_at(t)]
    }

    pub fn distance_at(&self, t: f64) -> Meters {
        Meters(self.cumulative_distance[self.index_at(t)])
    }

    pub fn race_time_at(&self, t: f64) -> Seconds {
        Seconds(self.clock[self.index_at(t)])
    }

    /// Number of lap starts at or before `t`
    pub fn laps_completed(&self, t: f64) -> u32 {
        self.lap_starts.partition_point(|&s| s <= t) as u32
    }

    pub fn finished(&self, t: f64) -> bool {
        t > self.finish_clock()
    }

    /// Path driven up to and including the sample at `t`
    pub fn trail_at(&self, t: f64) -> &[Point2] {
        &self.positions[..=self.index_at(t)]
    }
}

/// Normalized series keyed by entity, in insertion order
///
/// Insertion order is the tie-breaker of last resort in the leaderboard, so
/// this is a vector rather than a hash map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSet {
    entries: Vec<(EntityId, EntitySeries)>,
}

impl SeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series. Re-inserting an id replaces its series in place and
    /// keeps its original position.
    pub fn insert(&mut self, id: impl Into<EntityId>, series: EntitySeries) {
        let id = id.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = series,
            None => self.entries.push((id, series)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&EntitySeries> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, series)| series)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &EntitySeries)> {
        self.entries.iter().map(|(id, series)| (id, series))
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest finish clock over all entities, i.e. the replay duration
    pub fn max_finish_clock(&self) -> f64 {
        self.entries
            .iter()
            .map(|(_, series)| series.finish_clock())
            .fold(0.0, f64::max)
    }

    /// Lap counter shown to viewers: the most laps any entity has started
    pub fn current_lap(&self, t: f64) -> u32 {
        self.entries
            .iter()
            .map(|(_, series)| series.laps_completed(t))
            .max()
            .unwrap_or(0)
    }
}

impl FromIterator<(EntityId, EntitySeries)> for SeriesSet {
    fn from_iter<I: IntoIterator<Item = (EntityId, EntitySeries)>>(iter: I) -> Self {
        let mut set = SeriesSet::new();
        for (id, series) in iter {
            set.insert(id, series);
        }
        set
    }
}
