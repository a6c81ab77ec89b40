//! Per-window analysis types

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How a constant or linear component is removed before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetrendKind {
    /// Subtract the sample mean
    Constant,
    /// Subtract the least-squares line
    #[default]
    Linear,
}

/// Which chatter indicator formula a scheduler evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// Bisection-point spread over whole-trajectory spread
    #[default]
    VarianceRatio,
    /// Variance of per-revolution path length, normalised by the capture mean
    PathLengthVariance,
}

impl std::fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicatorKind::VarianceRatio => write!(f, "variance-ratio"),
            IndicatorKind::PathLengthVariance => write!(f, "path-length-variance"),
        }
    }
}

/// Half-open index range `[start, end)` into a sample buffer.
///
/// Indices are absolute: they count every sample ever appended to the
/// buffer, independent of how many old samples have been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Velocity and displacement derived from one window of acceleration.
///
/// Recomputed from scratch for every window; no state carries over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub time: Vec<f64>,
    pub vel_x: Vec<f64>,
    pub vel_y: Vec<f64>,
    pub disp_x: Vec<f64>,
    pub disp_y: Vec<f64>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.disp_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disp_x.is_empty()
    }
}

/// Displacement sampled at an estimated revolution boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BisectionPoint {
    /// Index into the window's trajectory
    pub index: usize,
    pub t: f64,
    pub x: f64,
    pub y: f64,
}

/// One chatter indicator value, stamped with the time of the window's last sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChatterReading {
    pub t: f64,
    pub value: f64,
}
