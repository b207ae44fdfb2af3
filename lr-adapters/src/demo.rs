//! Demo provider that generates a synthetic race for testing
//!
//! Simulates a small grid lapping a circuit with straights, braking zones,
//! corners and acceleration phases. Each driver has a fixed pace factor plus
//! a little per-lap variation. Samples are produced at 4Hz without requiring
//! any recorded data.
//!
//! Every lap after the first opens with a telemetry gap, the way recorded
//! sessions drop out around the start/finish line, so lap boundaries are
//! detectable on the stitched clock.

use anyhow::Result;
use lr_core::model::{EntityId, LapRun, RawSample, ReplayMode};
use lr_core::provider::TelemetryProvider;
use std::f64::consts::TAU;

const SAMPLE_INTERVAL: f64 = 0.25;
const PROFILE_STEP: f64 = 0.05;
const DEFAULT_LAPS: u32 = 5;

/// Lead-in of every lap run after the first, in seconds
pub const INTER_LAP_GAP: f64 = 25.0;

// =============================================================================
// Track definition: segments that form one reference lap
// =============================================================================

#[derive(Clone, Copy)]
struct TrackSegment {
    duration: f64,     // seconds to traverse at reference pace
    target_speed: f64, // m/s at end of segment
}

/// A simple circuit: 84s lap, mix of corners and straights
fn demo_track() -> Vec<TrackSegment> {
    let seg = |duration, target_speed| TrackSegment {
        duration,
        target_speed,
    };
    vec![
        // Start/finish straight
        seg(8.0, 75.0),
        // T1: heavy braking into slow right-hander
        seg(3.0, 28.0),
        seg(4.0, 25.0),
        seg(3.5, 55.0),
        // Short straight
        seg(4.0, 62.0),
        // T2: medium braking into fast left-hander
        seg(2.0, 45.0),
        seg(3.5, 42.0),
        seg(3.0, 58.0),
        // Back straight
        seg(10.0, 80.0),
        // T3: chicane
        seg(2.5, 35.0),
        seg(2.0, 32.0),
        seg(2.0, 30.0),
        seg(3.0, 50.0),
        // Medium straight
        seg(6.0, 68.0),
        // T4: long sweeping right
        seg(1.5, 52.0),
        seg(5.0, 50.0),
        seg(3.0, 60.0),
        // T5: tight hairpin left
        seg(3.5, 22.0),
        seg(4.5, 20.0),
        seg(4.0, 55.0),
        // Run to start/finish
        seg(6.0, 72.0),
    ]
}

/// Speed at a point in the reference lap, smoothly interpolated between the
/// previous segment's target and the current one
fn speed_at(track: &[TrackSegment], lap_time: f64) -> f64 {
    let mut elapsed = 0.0;
    for (i, seg) in track.iter().enumerate() {
        if elapsed + seg.duration > lap_time || i == track.len() - 1 {
            let prev = if i > 0 { track[i - 1] } else { track[track.len() - 1] };
            let seg_t = ((lap_time - elapsed) / seg.duration).clamp(0.0, 1.0);
            return lerp(prev.target_speed, seg.target_speed, smoothstep(seg_t));
        }
        elapsed += seg.duration;
    }
    0.0
}

/// Cumulative reference-lap distance sampled every `PROFILE_STEP` seconds
fn distance_profile(track: &[TrackSegment], lap_duration: f64) -> Vec<f64> {
    let steps = (lap_duration / PROFILE_STEP).round() as usize;
    let mut profile = Vec::with_capacity(steps + 1);
    let mut total = 0.0;
    profile.push(0.0);
    for i in 0..steps {
        let t = (i as f64 + 0.5) * PROFILE_STEP;
        total += speed_at(track, t) * PROFILE_STEP;
        profile.push(total);
    }
    profile
}

/// Closed circuit outline, `fraction` in [0, 1]
fn track_point(fraction: f64) -> (f64, f64) {
    let theta = fraction * TAU;
    (
        900.0 * theta.cos() + 120.0 * (2.0 * theta).cos(),
        500.0 * theta.sin() + 80.0 * (3.0 * theta).sin(),
    )
}

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Simple deterministic noise from a seed
fn noise(seed: f64) -> f64 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f64, amplitude: f64) -> f64 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

// =============================================================================
// Grid
// =============================================================================

#[derive(Clone)]
struct DemoDriver {
    code: &'static str,
    team: &'static str,
    /// Lap time multiplier relative to the reference lap
    pace: f64,
    /// Retires after completing this many laps
    retire_after: Option<u32>,
    /// Laps whose telemetry "failed to download"
    missing_laps: &'static [u32],
    has_telemetry: bool,
}

fn demo_grid() -> Vec<DemoDriver> {
    let driver = |code, team, pace| DemoDriver {
        code,
        team,
        pace,
        retire_after: None,
        missing_laps: &[],
        has_telemetry: true,
    };
    vec![
        driver("VER", "Red Bull Racing", 1.000),
        driver("NOR", "McLaren", 1.003),
        driver("LEC", "Ferrari", 1.006),
        DemoDriver {
            retire_after: Some(3),
            ..driver("HAM", "Ferrari", 1.008)
        },
        DemoDriver {
            missing_laps: &[2],
            ..driver("PIA", "McLaren", 1.011)
        },
        DemoDriver {
            has_telemetry: false,
            ..driver("SAR", "Williams", 1.030)
        },
    ]
}

// =============================================================================
// DemoProvider
// =============================================================================

pub struct DemoProvider {
    drivers: Vec<DemoDriver>,
    laps: u32,
    lap_duration: f64,
    profile: Vec<f64>,
}

impl DemoProvider {
    pub fn new() -> Self {
        Self::with_laps(DEFAULT_LAPS)
    }

    /// A demo race over `laps` laps (at least one)
    pub fn with_laps(laps: u32) -> Self {
        let track = demo_track();
        let lap_duration: f64 = track.iter().map(|s| s.duration).sum();
        let profile = distance_profile(&track, lap_duration);
        Self {
            drivers: demo_grid(),
            laps: laps.max(1),
            lap_duration,
            profile,
        }
    }

    pub fn laps(&self) -> u32 {
        self.laps
    }

    fn driver(&self, code: &str) -> Option<&DemoDriver> {
        self.drivers.iter().find(|d| d.code == code)
    }

    fn lap_time(&self, driver: &DemoDriver, lap: u32) -> f64 {
        let seed = driver.pace * 1000.0 + lap as f64;
        self.lap_duration * driver.pace * (1.0 + jitter(seed, 0.004))
    }

    fn laps_driven(&self, driver: &DemoDriver) -> u32 {
        driver.retire_after.unwrap_or(self.laps).min(self.laps)
    }

    /// Fraction of the lap covered after `track_time` seconds of reference pace
    fn lap_fraction(&self, track_time: f64) -> f64 {
        let lap_length = self.profile[self.profile.len() - 1];
        let pos = (track_time / PROFILE_STEP).clamp(0.0, (self.profile.len() - 1) as f64);
        let i = pos.floor() as usize;
        let next = (i + 1).min(self.profile.len() - 1);
        let distance = lerp(self.profile[i], self.profile[next], pos - i as f64);
        distance / lap_length
    }

    fn generate_lap(&self, driver: &DemoDriver, lap: u32, lead_in: f64) -> Vec<RawSample> {
        let lap_time = self.lap_time(driver, lap);
        let time_scale = self.lap_duration / lap_time;
        let count = (lap_time / SAMPLE_INTERVAL).ceil() as usize;

        (0..=count)
            .map(|k| {
                let tau = (k as f64 * SAMPLE_INTERVAL).min(lap_time);
                let (x, y) = track_point(self.lap_fraction(tau * time_scale));
                let seed = driver.pace * 7919.0 + lap as f64 * 101.0 + k as f64;
                let mut sample = RawSample::new(
                    x + jitter(seed, 0.3),
                    y + jitter(seed * 1.1, 0.3),
                    lead_in + tau,
                );
                // Occasional position dropout, as real feeds have
                if noise(seed * 1.3) < 0.005 {
                    sample.x = None;
                }
                sample
            })
            .collect()
    }

    fn fastest_lap(&self, driver: &DemoDriver) -> Option<u32> {
        (1..=self.laps_driven(driver))
            .filter(|lap| !driver.missing_laps.contains(lap))
            .min_by(|a, b| {
                self.lap_time(driver, *a)
                    .total_cmp(&self.lap_time(driver, *b))
            })
    }
}

impl Default for DemoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryProvider for DemoProvider {
    fn name(&self) -> &str {
        "Demo"
    }

    fn entities(&self) -> Vec<EntityId> {
        self.drivers.iter().map(|d| d.code.to_string()).collect()
    }

    fn team(&self, entity: &str) -> Option<String> {
        self.driver(entity).map(|d| d.team.to_string())
    }

    fn fetch_samples(&self, entity: &str, mode: ReplayMode) -> Result<Option<Vec<LapRun>>> {
        let driver = match self.driver(entity) {
            Some(d) if d.has_telemetry => d,
            _ => return Ok(None),
        };

        let runs = match mode {
            ReplayMode::FastestLap => self
                .fastest_lap(driver)
                .map(|lap| {
                    vec![LapRun::new(lap, self.generate_lap(driver, lap, 0.0))
                        .with_lap_time(self.lap_time(driver, lap))]
                })
                .unwrap_or_default(),
            ReplayMode::FullSession => (1..=self.laps_driven(driver))
                .map(|lap| {
                    if driver.missing_laps.contains(&lap) {
                        LapRun::unavailable(lap)
                    } else {
                        let lead_in = if lap == 1 { 0.0 } else { INTER_LAP_GAP };
                        LapRun::new(lap, self.generate_lap(driver, lap, lead_in))
                            .with_lap_time(self.lap_time(driver, lap))
                    }
                })
                .collect(),
        };

        Ok(Some(runs))
    }
}
