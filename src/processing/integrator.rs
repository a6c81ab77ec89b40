//! Acceleration to displacement by double trapezoidal integration
//!
//! Each stage is linearly detrended: sensor bias integrates into a ramp in
//! velocity and a parabola in displacement, and removing the best-fit line
//! after each stage keeps the drift bounded within the window.

use super::{detrend, ProcessingError};
use crate::types::{DetrendKind, Trajectory};

/// Cumulative trapezoid starting at zero. `values` and `time` must have equal length.
pub fn cumulative_trapezoid(values: &[f64], time: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut acc = 0.0;
    for i in 0..values.len().min(time.len()) {
        if i > 0 {
            acc += (values[i] + values[i - 1]) / 2.0 * (time[i] - time[i - 1]);
        }
        out.push(acc);
    }
    out
}

/// Integrate twice with a linear detrend after each stage.
///
/// Returns `(velocity, displacement)`.
pub fn integrate_twice(
    accel: &[f64],
    time: &[f64],
) -> Result<(Vec<f64>, Vec<f64>), ProcessingError> {
    if accel.len() != time.len() {
        return Err(ProcessingError::InsufficientSamples {
            needed: accel.len(),
            available: time.len(),
        });
    }
    if accel.len() < 2 {
        return Err(ProcessingError::InsufficientSamples {
            needed: 2,
            available: accel.len(),
        });
    }

    let velocity = detrend(&cumulative_trapezoid(accel, time), DetrendKind::Linear);
    let displacement = detrend(&cumulative_trapezoid(&velocity, time), DetrendKind::Linear);
    Ok((velocity, displacement))
}

/// Build the per-window trajectory from conditioned accelerations.
pub fn integrate_trajectory(
    time: &[f64],
    accel_x: &[f64],
    accel_y: &[f64],
) -> Result<Trajectory, ProcessingError> {
    let (vel_x, disp_x) = integrate_twice(accel_x, time)?;
    let (vel_y, disp_y) = integrate_twice(accel_y, time)?;
    Ok(Trajectory {
        time: time.to_vec(),
        vel_x,
        vel_y,
        disp_x,
        disp_y,
    })
}
