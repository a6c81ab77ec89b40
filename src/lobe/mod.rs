//! Stability-lobe model and calibration fit
//!
//! The limiting stable depth of cut for a single-degree-of-freedom
//! regenerative chatter model is
//!
//! ```text
//! G(n) = -(x2 + i·c2) / ( i·n² / (x3 + i·c3) + (x4 + i·c4)·i·n / (x3 + i·c3) + 1 )
//! depth(n) = 1 / (2·x1·|min(Re G(n), 0)|)
//! ```
//!
//! with `n` the spindle speed in rpm. The complex constants are split into
//! seven real unknowns `[x1, x2, x3, x4, c2, c3, c4]`, fitted by
//! Levenberg-Marquardt to the (rpm, depth) points recorded at chatter onset.
//!
//! The parameters are not individually identifiable (scaling `x1` and `x2`
//! together leaves the curve unchanged), so only the fitted curve is
//! meaningful, not the parameter values.

mod fitter;
mod model;

pub use fitter::*;
pub use model::*;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FitError {
    #[error("Underdetermined fit: {points} points for {parameters} parameters")]
    Underdetermined { points: usize, parameters: usize },

    #[error("Fit did not converge after {iterations} iterations (cost {cost:e}): {reason}")]
    NonConvergence {
        iterations: usize,
        cost: f64,
        reason: String,
    },
}
