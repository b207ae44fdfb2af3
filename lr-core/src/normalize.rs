//! Entity telemetry normalizer
//!
//! Turns a provider's raw lap runs into an [`EntitySeries`] with a
//! zero-based race clock, cumulative path distance and detected lap starts.
//!
//! Lap detection is a heuristic: a clock gap larger than the configured
//! threshold between two consecutive samples is read as a lap boundary.
//! It assumes samples within one lap are never that far apart and that
//! inter-lap telemetry gaps always are.
//!
//! Fastest-lap selection trusts the provider's lap time when one is given.
//! Without lap times, only runs that cover most of the longest run's path
//! compete on duration, so a short fragment of a lap never wins.

use crate::config::{ReplayConfig, DEFAULT_LAP_GAP_THRESHOLD};
use crate::error::{ConfigError, Result};
use crate::model::{LapRun, RawSample, ReplayMode};
use crate::series::EntitySeries;
use crate::units::Point2;
use tracing::debug;

/// Share of the longest candidate's path a run must cover to count as a
/// complete lap
const COMPLETE_LAP_SHARE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    lap_gap_threshold: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            lap_gap_threshold: DEFAULT_LAP_GAP_THRESHOLD,
        }
    }
}

impl Normalizer {
    /// The threshold must be finite and positive, otherwise every sample
    /// pair (or none) would read as a lap boundary.
    pub fn new(lap_gap_threshold: f64) -> Result<Self> {
        if !lap_gap_threshold.is_finite() || lap_gap_threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold {
                name: "lap_gap_threshold",
                value: lap_gap_threshold,
            });
        }
        Ok(Self { lap_gap_threshold })
    }

    pub fn from_config(config: &ReplayConfig) -> Result<Self> {
        Self::new(config.lap_gap_threshold)
    }

    pub fn lap_gap_threshold(&self) -> f64 {
        self.lap_gap_threshold
    }

    /// Build a series from per-lap runs.
    ///
    /// Returns `None` when no usable sample survives filtering; an entity
    /// without telemetry is excluded from the replay, not an error.
    pub fn normalize(&self, runs: &[LapRun], mode: ReplayMode) -> Option<EntitySeries> {
        let usable: Vec<UsableRun> = runs
            .iter()
            .filter_map(|run| {
                let samples = filter_usable(run.samples.as_deref()?);
                (!samples.is_empty()).then_some(UsableRun {
                    lap_time: run.lap_time.filter(|t| t.is_finite() && *t > 0.0),
                    samples,
                })
            })
            .collect();

        let samples = match mode {
            ReplayMode::FastestLap => pick_fastest(usable)?,
            ReplayMode::FullSession => concatenate(usable.into_iter().map(|run| run.samples)),
        };

        self.build(samples)
    }

    /// Build a series from a single contiguous run
    pub fn normalize_samples(&self, samples: &[RawSample]) -> Option<EntitySeries> {
        let usable = filter_usable(samples);
        debug!(
            kept = usable.len(),
            dropped = samples.len() - usable.len(),
            "Filtered raw samples"
        );
        self.build(usable)
    }

    fn build(&self, samples: Vec<(Point2, f64)>) -> Option<EntitySeries> {
        let origin = samples.first()?.1;

        let mut clock = Vec::with_capacity(samples.len());
        let mut positions = Vec::with_capacity(samples.len());
        for (position, t) in samples {
            clock.push(t - origin);
            positions.push(position);
        }

        let cumulative_distance = cumulative_distance(&positions);
        let lap_starts = detect_lap_starts(&clock, self.lap_gap_threshold);

        Some(EntitySeries::from_parts(
            clock,
            positions,
            cumulative_distance,
            lap_starts,
        ))
    }
}

/// Usable samples of one run, ordered by timestamp. The sort is stable so
/// recorded order survives for equal timestamps.
fn filter_usable(samples: &[RawSample]) -> Vec<(Point2, f64)> {
    let mut usable: Vec<(Point2, f64)> = samples.iter().filter_map(RawSample::usable).collect();
    usable.sort_by(|a, b| a.1.total_cmp(&b.1));
    usable
}

struct UsableRun {
    lap_time: Option<f64>,
    samples: Vec<(Point2, f64)>,
}

fn run_duration(run: &[(Point2, f64)]) -> f64 {
    match (run.first(), run.last()) {
        (Some(first), Some(last)) => last.1 - first.1,
        _ => 0.0,
    }
}

fn path_length(run: &[(Point2, f64)]) -> f64 {
    run.windows(2).map(|pair| pair[0].0.distance_to(&pair[1].0)).sum()
}

/// The fastest run: lowest lap time when any run carries one, otherwise the
/// shortest duration among complete laps. A run with fewer than two usable
/// samples only wins when nothing else is left.
fn pick_fastest(runs: Vec<UsableRun>) -> Option<Vec<(Point2, f64)>> {
    let timed = runs
        .iter()
        .enumerate()
        .filter(|(_, run)| run.samples.len() >= 2)
        .filter_map(|(i, run)| Some((i, run.lap_time?)))
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((index, _)) = timed {
        return runs.into_iter().nth(index).map(|run| run.samples);
    }

    let candidates: Vec<(usize, f64, f64)> = runs
        .iter()
        .enumerate()
        .filter(|(_, run)| run.samples.len() >= 2 && run_duration(&run.samples) > 0.0)
        .map(|(i, run)| (i, run_duration(&run.samples), path_length(&run.samples)))
        .collect();

    let longest = candidates.iter().map(|c| c.2).fold(0.0, f64::max);
    let fastest = candidates
        .iter()
        .filter(|c| c.2 >= longest * COMPLETE_LAP_SHARE)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|c| c.0);

    match fastest {
        Some(index) => runs.into_iter().nth(index).map(|run| run.samples),
        None => runs.into_iter().max_by_key(|run| run.samples.len()).map(|run| run.samples),
    }
}

/// Stitch lap runs into one clock. Each run is shifted by the previous
/// run's last shifted timestamp; a run whose raw clock starts below zero
/// is held at that timestamp so the result never runs backwards.
fn concatenate(runs: impl Iterator<Item = Vec<(Point2, f64)>>) -> Vec<(Point2, f64)> {
    let mut out: Vec<(Point2, f64)> = Vec::new();
    let mut offset = 0.0;

    for run in runs {
        for (position, t) in run {
            let floor = out.last().map_or(f64::NEG_INFINITY, |last| last.1);
            out.push((position, (t + offset).max(floor)));
        }
        if let Some(last) = out.last() {
            offset = last.1;
        }
    }

    out
}

fn cumulative_distance(positions: &[Point2]) -> Vec<f64> {
    let mut total = 0.0;
    let mut out = Vec::with_capacity(positions.len());
    out.push(0.0);
    for pair in positions.windows(2) {
        total += pair[0].distance_to(&pair[1]);
        out.push(total);
    }
    out.truncate(positions.len());
    out
}

fn detect_lap_starts(clock: &[f64], threshold: f64) -> Vec<f64> {
    let mut starts = vec![0.0];
    for pair in clock.windows(2) {
        if pair[1] - pair[0] > threshold {
            starts.push(pair[1]);
        }
    }
    starts
}
