//! Stability-lobe calibration data

use serde::{Deserialize, Serialize};

/// Spindle speed and depth of cut recorded when chatter onset was detected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LobePoint {
    pub rpm: f64,
    pub depth: f64,
}

impl LobePoint {
    pub const fn new(rpm: f64, depth: f64) -> Self {
        Self { rpm, depth }
    }
}

/// How depth of cut is derived from the machine's axis position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutGeometry {
    /// Inclined stock: depth grows with X travel at a known angle
    #[default]
    Incline,
    /// Flat stock: depth is the Z position below the part zero
    Flat,
}
