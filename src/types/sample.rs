//! Raw acquisition samples

use serde::{Deserialize, Serialize};

/// One biaxial acceleration reading.
///
/// `t` is seconds since the start of the capture and strictly increasing
/// within a buffer. Accelerations are in m/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    pub ax: f64,
    pub ay: f64,
}

impl Sample {
    pub const fn new(t: f64, ax: f64, ay: f64) -> Self {
        Self { t, ax, ay }
    }
}

/// Machine load percentages sampled once per acquisition batch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadSample {
    /// Capture time the loads were associated with (end of the batch)
    pub t: f64,
    pub spindle: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}
