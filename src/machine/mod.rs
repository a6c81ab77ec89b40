//! Machine-tool state collaborator
//!
//! The controller is queried for spindle speed, loads, axis positions and
//! run state. Every query can fail or hang, so all of them go through
//! [`MachineMonitor`], which bounds each call with a timeout and falls back to
//! the last value that was read successfully.

mod geometry;
mod monitor;
mod simulated;

pub use geometry::*;
pub use monitor::*;
pub use simulated::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine query errors. Never fatal to a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MachineQueryError {
    #[error("Machine query '{query}' timed out after {timeout_ms} ms")]
    Timeout { query: &'static str, timeout_ms: u64 },

    #[error("Machine unavailable: {0}")]
    Unavailable(String),
}

/// Linear machine axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// Point-in-time queries against the machine controller.
#[async_trait]
pub trait MachineState: Send + Sync + 'static {
    /// Actual spindle speed (rpm)
    async fn spindle_rpm(&self) -> Result<f64, MachineQueryError>;

    /// Spindle load (% of rated)
    async fn spindle_load(&self) -> Result<f64, MachineQueryError>;

    /// Axis drive load (% of rated)
    async fn axis_load(&self, axis: Axis) -> Result<f64, MachineQueryError>;

    /// Machine coordinate of an axis (mm)
    async fn axis_position(&self, axis: Axis) -> Result<f64, MachineQueryError>;

    /// A cycle is running and the operator has not zeroed the rapid override.
    async fn cycle_active(&self) -> Result<bool, MachineQueryError>;

    /// Stop-cycle: motion has stopped and the cut is over.
    async fn motion_stopped(&self) -> Result<bool, MachineQueryError>;

    fn machine_name(&self) -> &str;
}
