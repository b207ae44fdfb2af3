//! Leaderboard ranking engine
//!
//! A snapshot is recomputed from scratch for every query time. Ranking is
//! laps completed (desc), then distance covered (desc); exact ties keep the
//! insertion order of the [`SeriesSet`].

use crate::config::DEFAULT_METERS_PER_SECOND;
use crate::error::{ConfigError, Result};
use crate::model::EntityId;
use crate::series::SeriesSet;
use crate::units::{Meters, Seconds};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Gap of one entity to the current leader
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum GapDescriptor {
    Leader,
    LapsDown(u32),
    /// Estimated from the distance deficit at a constant pace; approximate
    TimeGap(Seconds),
    RetiredOrDnf,
}

impl fmt::Display for GapDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapDescriptor::Leader => write!(f, "LEADER"),
            GapDescriptor::LapsDown(n) => write!(f, "+{}L", n),
            GapDescriptor::TimeGap(secs) => write!(f, "+{:.1}s", secs.0),
            GapDescriptor::RetiredOrDnf => write!(f, "DNF"),
        }
    }
}

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub entity_id: EntityId,
    pub laps_completed: u32,
    /// Clock value of the sample the entity is shown at
    pub race_time: Seconds,
    pub distance: Meters,
    pub finished: bool,
    /// Zero-based; the leader has rank 0
    pub rank: usize,
    pub gap: GapDescriptor,
}

impl Standing {
    /// One-based position for display
    pub fn position(&self) -> usize {
        self.rank + 1
    }
}

/// Ranked standings at one query time
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StandingsSnapshot {
    pub time: Seconds,
    pub standings: Vec<Standing>,
}

impl StandingsSnapshot {
    pub fn leader(&self) -> Option<&Standing> {
        self.standings.first()
    }

    pub fn get(&self, entity_id: &str) -> Option<&Standing> {
        self.standings.iter().find(|s| s.entity_id == entity_id)
    }

    pub fn len(&self) -> usize {
        self.standings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }
}

/// Computes standings snapshots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingEngine {
    meters_per_second: f64,
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self {
            meters_per_second: DEFAULT_METERS_PER_SECOND,
        }
    }
}

impl RankingEngine {
    /// Fails unless the pace ratio is finite and positive; time gaps are
    /// divided by it.
    pub fn new(meters_per_second: f64) -> Result<Self> {
        if !meters_per_second.is_finite() || meters_per_second <= 0.0 {
            return Err(ConfigError::InvalidThreshold {
                name: "meters_per_second",
                value: meters_per_second,
            });
        }
        Ok(Self { meters_per_second })
    }

    /// Rank every entity at time `t`.
    ///
    /// Pure: identical `(series, t)` always yields an identical snapshot.
    pub fn snapshot(&self, series: &SeriesSet, t: f64) -> StandingsSnapshot {
        let mut rows: Vec<Standing> = series
            .iter()
            .map(|(id, s)| Standing {
                entity_id: id.clone(),
                laps_completed: s.laps_completed(t),
                race_time: s.race_time_at(t),
                distance: s.distance_at(t),
                finished: s.finished(t),
                rank: 0,
                gap: GapDescriptor::Leader,
            })
            .collect();

        // sort_by is stable: exact ties keep insertion order
        rows.sort_by(compare_standing);

        if let Some(leader) = rows.first() {
            let leader_laps = leader.laps_completed;
            let leader_distance = leader.distance;

            for (rank, row) in rows.iter_mut().enumerate() {
                row.rank = rank;
                row.gap = if rank == 0 {
                    GapDescriptor::Leader
                } else if row.finished {
                    GapDescriptor::RetiredOrDnf
                } else if row.laps_completed < leader_laps {
                    GapDescriptor::LapsDown(leader_laps - row.laps_completed)
                } else {
                    GapDescriptor::TimeGap((leader_distance - row.distance).at_pace(self.meters_per_second))
                };
            }
        }

        StandingsSnapshot {
            time: Seconds(t),
            standings: rows,
        }
    }
}

fn compare_standing(a: &Standing, b: &Standing) -> Ordering {
    b.laps_completed
        .cmp(&a.laps_completed)
        .then_with(|| b.distance.0.total_cmp(&a.distance.0))
}

/// Snapshot with an explicit distance-per-second ratio
pub fn snapshot(series: &SeriesSet, t: f64, meters_per_second: f64) -> Result<StandingsSnapshot> {
    Ok(RankingEngine::new(meters_per_second)?.snapshot(series, t))
}
