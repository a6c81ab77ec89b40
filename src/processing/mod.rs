//! Signal processing - acceleration windows to chatter indicators
//!
//! ```text
//! raw window ──► SignalConditioner (detrend + Butterworth high-pass, SOS)
//!            ──► Integrator (trapezoid ×2, linear detrend after each stage)
//!            ──► RevolutionClock (boundary indices from nominal RPM)
//!            ──► PoincareSampler (displacement at each boundary)
//!            ──► indicator (variance-ratio | path-length-variance)
//! ```
//!
//! Every stage works on one window only. Windows share the designed filter
//! read-only and nothing else.

mod filter_design;
mod conditioner;
mod integrator;
mod revolution;
mod poincare;
mod indicator;
mod analyzer;

pub use filter_design::*;
pub use conditioner::*;
pub use integrator::*;
pub use revolution::*;
pub use poincare::*;
pub use indicator::*;
pub use analyzer::*;

use thiserror::Error;

/// Errors in signal processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Invalid filter spec: {0}")]
    InvalidFilterSpec(String),

    #[error("Insufficient samples: need {needed}, have {available}")]
    InsufficientSamples { needed: usize, available: usize },

    #[error("Degenerate window: {0}")]
    DegenerateWindow(String),

    #[error("Invalid spindle speed: {0} rpm")]
    InvalidSpindleSpeed(f64),

    #[error("Invalid window plan: {0}")]
    InvalidWindowPlan(String),
}

impl ProcessingError {
    /// Short, stable label used for skip diagnostics.
    pub fn reason(&self) -> &'static str {
        match self {
            ProcessingError::InvalidFilterSpec(_) => "invalid_filter_spec",
            ProcessingError::InsufficientSamples { .. } => "insufficient_samples",
            ProcessingError::DegenerateWindow(_) => "degenerate_window",
            ProcessingError::InvalidSpindleSpeed(_) => "invalid_spindle_speed",
            ProcessingError::InvalidWindowPlan(_) => "invalid_window_plan",
        }
    }

    /// Whether this error only invalidates the window it came from.
    pub const fn is_per_window(&self) -> bool {
        matches!(
            self,
            ProcessingError::InsufficientSamples { .. } | ProcessingError::DegenerateWindow(_)
        )
    }
}
