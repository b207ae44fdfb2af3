//! Type-safe wrappers for replay quantities
//!
//! Race clocks and path distances are carried as f64 internally; these
//! newtypes mark them at the API boundary so a time is never passed where a
//! distance is expected.
//!
//! All unit types serialize with 4 decimal places to reduce JSON payload size.

use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// Round f64 to 4 decimal places for compact JSON serialization
fn round4<S: serde::Serializer>(val: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((*val * 10000.0).round() / 10000.0)
}

/// Seconds on the zero-based race clock
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Seconds(#[serde(serialize_with = "round4")] pub f64);

/// Path length in track units (meters for the usual providers)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Meters(#[serde(serialize_with = "round4")] pub f64);

impl Meters {
    /// Convert a distance into an estimated time at a constant pace.
    ///
    /// This is a heuristic: `pace` is a fixed distance-per-second ratio, not
    /// a measured speed.
    pub fn at_pace(self, pace: f64) -> Seconds {
        Seconds(self.0 / pace)
    }
}

impl Sub for Meters {
    type Output = Meters;

    fn sub(self, rhs: Meters) -> Meters {
        Meters(self.0 - rhs.0)
    }
}

/// A planar track position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    #[serde(serialize_with = "round4")]
    pub x: f64,
    #[serde(serialize_with = "round4")]
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned box enclosing a set of track positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(serialize_with = "round4")]
    pub min_x: f64,
    #[serde(serialize_with = "round4")]
    pub min_y: f64,
    #[serde(serialize_with = "round4")]
    pub max_x: f64,
    #[serde(serialize_with = "round4")]
    pub max_y: f64,
}

impl Bounds {
    /// Smallest box holding every point, grown by `margin` on each side.
    /// `None` for an empty slice.
    pub fn around(points: &[Point2], margin: f64) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in &points[1..] {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.max_y = bounds.max_y.max(p.y);
        }

        Some(Bounds {
            min_x: bounds.min_x - margin,
            min_y: bounds.min_y - margin,
            max_x: bounds.max_x + margin,
            max_y: bounds.max_y + margin,
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}
