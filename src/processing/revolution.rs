//! Revolution boundaries estimated from nominal spindle speed

use super::ProcessingError;

/// Expected revolution period from a nominal RPM.
///
/// There is no shaft encoder: boundaries are placed by elapsed time alone,
/// so phase error accumulates with any deviation from the nominal speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevolutionClock {
    rpm: f64,
    period: f64,
}

impl RevolutionClock {
    pub fn new(rpm: f64) -> Result<Self, ProcessingError> {
        if !rpm.is_finite() || rpm <= 0.0 {
            return Err(ProcessingError::InvalidSpindleSpeed(rpm));
        }
        Ok(Self {
            rpm,
            period: 60.0 / rpm,
        })
    }

    pub const fn rpm(&self) -> f64 {
        self.rpm
    }

    /// Seconds per revolution
    pub const fn period(&self) -> f64 {
        self.period
    }

    /// Indices where at least one period has elapsed since the previous boundary.
    ///
    /// The reference time starts at `time[0]`, which is never itself a boundary.
    pub fn mark_boundaries(&self, time: &[f64]) -> Vec<usize> {
        let Some(&first) = time.first() else {
            return Vec::new();
        };
        let mut last = first;
        let mut boundaries = Vec::new();
        for (i, &t) in time.iter().enumerate().skip(1) {
            if t >= last + self.period {
                boundaries.push(i);
                last = t;
            }
        }
        boundaries
    }
}
