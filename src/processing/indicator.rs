//! Chatter indicators over one window
//!
//! Both variants are unitless and rise as motion departs from
//! revolution-periodic:
//!
//! - **variance-ratio**: `sd(bisX)·sd(bisY) / (sd(dispX)·sd(dispY))`
//! - **path-length-variance**: variance of the path length travelled between
//!   consecutive bisection points, normalised by the squared mean path length
//!   over the whole capture. The normaliser spans windows, so this variant
//!   yields a raw [`WindowIndicator::PathLength`] that a
//!   [`PathLengthNormalizer`] turns into a value.

use statrs::statistics::Statistics;

use super::ProcessingError;
use crate::types::{BisectionPoint, IndicatorKind, Trajectory};

/// Raw per-window indicator output.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowIndicator {
    Ratio(f64),
    PathLength { variance: f64, lengths: Vec<f64> },
}

impl IndicatorKind {
    pub fn evaluate(
        self,
        trajectory: &Trajectory,
        points: &[BisectionPoint],
    ) -> Result<WindowIndicator, ProcessingError> {
        match self {
            IndicatorKind::VarianceRatio => variance_ratio(trajectory, points).map(WindowIndicator::Ratio),
            IndicatorKind::PathLengthVariance => {
                let lengths = path_lengths(trajectory, points)?;
                let variance = lengths.iter().variance();
                Ok(WindowIndicator::PathLength { variance, lengths })
            }
        }
    }
}

/// Bisection-point spread over whole-trajectory spread (sample standard deviations).
pub fn variance_ratio(
    trajectory: &Trajectory,
    points: &[BisectionPoint],
) -> Result<f64, ProcessingError> {
    if points.len() < 2 {
        return Err(ProcessingError::DegenerateWindow(format!(
            "{} bisection point(s), need at least 2",
            points.len()
        )));
    }
    if trajectory.len() < 2 {
        return Err(ProcessingError::InsufficientSamples {
            needed: 2,
            available: trajectory.len(),
        });
    }

    let sd_disp_x = trajectory.disp_x.iter().std_dev();
    let sd_disp_y = trajectory.disp_y.iter().std_dev();
    let spread = sd_disp_x * sd_disp_y;
    if !spread.is_finite() || spread <= 0.0 {
        return Err(ProcessingError::DegenerateWindow(format!(
            "trajectory spread is zero (sd_x={sd_disp_x:e}, sd_y={sd_disp_y:e})"
        )));
    }

    let sd_bis_x = points.iter().map(|p| p.x).std_dev();
    let sd_bis_y = points.iter().map(|p| p.y).std_dev();
    let ratio = sd_bis_x * sd_bis_y / spread;
    if ratio.is_finite() {
        Ok(ratio)
    } else {
        Err(ProcessingError::DegenerateWindow("non-finite indicator".to_string()))
    }
}

/// Euclidean path length between each pair of consecutive bisection points.
pub fn path_lengths(
    trajectory: &Trajectory,
    points: &[BisectionPoint],
) -> Result<Vec<f64>, ProcessingError> {
    if points.len() < 3 {
        return Err(ProcessingError::DegenerateWindow(format!(
            "{} bisection point(s), path-length variance needs at least 3",
            points.len()
        )));
    }

    let lengths: Vec<f64> = points
        .windows(2)
        .map(|pair| {
            let (from, to) = (pair[0].index, pair[1].index.min(trajectory.len() - 1));
            (from..to)
                .map(|i| {
                    let dx = trajectory.disp_x[i + 1] - trajectory.disp_x[i];
                    let dy = trajectory.disp_y[i + 1] - trajectory.disp_y[i];
                    dx.hypot(dy)
                })
                .sum()
        })
        .collect();

    if lengths.iter().all(|l| *l == 0.0) {
        return Err(ProcessingError::DegenerateWindow("trajectory does not move".to_string()));
    }
    Ok(lengths)
}

// ============================================================================
// Cross-window normalisation
// ============================================================================

/// Running mean of per-revolution path length across a capture.
#[derive(Debug, Clone, Default)]
pub struct PathLengthNormalizer {
    total: f64,
    count: usize,
    /// Raw `(t, variance)` of every window seen, for final renormalisation
    raw: Vec<(f64, f64)>,
}

impl PathLengthNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one window and return its value under the running mean.
    pub fn push(&mut self, t: f64, variance: f64, lengths: &[f64]) -> f64 {
        self.total += lengths.iter().sum::<f64>();
        self.count += lengths.len();
        self.raw.push((t, variance));
        self.normalize(variance)
    }

    pub fn mean_length(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }

    pub fn normalize(&self, variance: f64) -> f64 {
        match self.mean_length() {
            Some(mean) if mean > 0.0 => variance / (mean * mean),
            _ => f64::NAN,
        }
    }

    /// Every window seen, normalised by the capture-wide mean.
    pub fn finalize(&self) -> Vec<(f64, f64)> {
        self.raw.iter().map(|&(t, v)| (t, self.normalize(v))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{PoincareSampler, RevolutionClock};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn orbit(rate: f64, seconds: f64, freq: f64) -> Trajectory {
        let n = (rate * seconds) as usize;
        let time: Vec<f64> = (0..n).map(|i| i as f64 / rate).collect();
        Trajectory {
            disp_x: time.iter().map(|t| (2.0 * PI * freq * t).sin()).collect(),
            disp_y: time.iter().map(|t| 0.5 * (2.0 * PI * freq * t).cos()).collect(),
            vel_x: vec![0.0; n],
            vel_y: vec![0.0; n],
            time,
        }
    }

    fn points_at(trajectory: &Trajectory, indices: &[usize]) -> Vec<BisectionPoint> {
        PoincareSampler::collect(trajectory, indices)
    }

    #[test]
    fn test_periodic_trajectory_scores_near_zero() {
        // Boundaries exactly every 160 samples on a 50 Hz orbit at 8 kHz
        let trajectory = orbit(8000.0, 0.3, 50.0);
        let indices: Vec<usize> = (1..15).map(|k| k * 160).collect();
        let value = variance_ratio(&trajectory, &points_at(&trajectory, &indices)).unwrap();
        assert!(value < 1e-6, "value: {value}");
    }

    #[test]
    fn test_clock_driven_boundaries_stay_low() {
        let trajectory = orbit(8000.0, 0.3, 50.0);
        let boundaries = RevolutionClock::new(3000.0).unwrap().mark_boundaries(&trajectory.time);
        let value = variance_ratio(&trajectory, &points_at(&trajectory, &boundaries)).unwrap();
        assert!(value < 0.05, "value: {value}");
    }

    #[test]
    fn test_full_spread_scores_near_one() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 1000;
        let trajectory = Trajectory {
            time: (0..n).map(|i| i as f64).collect(),
            vel_x: vec![0.0; n],
            vel_y: vec![0.0; n],
            disp_x: (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect(),
            disp_y: (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect(),
        };
        let every: Vec<usize> = (0..n).collect();
        let value = variance_ratio(&trajectory, &points_at(&trajectory, &every)).unwrap();
        assert!((value - 1.0).abs() < 1e-12, "value: {value}");

        let all_but_first: Vec<usize> = (1..n).collect();
        let value = variance_ratio(&trajectory, &points_at(&trajectory, &all_but_first)).unwrap();
        assert!((value - 1.0).abs() < 0.02, "value: {value}");
    }

    #[test]
    fn test_degenerate_windows() {
        let trajectory = orbit(8000.0, 0.3, 50.0);
        let one = points_at(&trajectory, &[160]);
        assert!(matches!(
            variance_ratio(&trajectory, &one),
            Err(ProcessingError::DegenerateWindow(_))
        ));

        let flat = Trajectory {
            disp_y: vec![0.0; trajectory.len()],
            ..trajectory.clone()
        };
        let points = points_at(&flat, &[160, 320, 480]);
        assert!(matches!(
            variance_ratio(&flat, &points),
            Err(ProcessingError::DegenerateWindow(_))
        ));
    }

    #[test]
    fn test_path_lengths_of_periodic_orbit_are_equal() {
        let trajectory = orbit(8000.0, 0.3, 50.0);
        let indices: Vec<usize> = (1..15).map(|k| k * 160).collect();
        let lengths = path_lengths(&trajectory, &points_at(&trajectory, &indices)).unwrap();
        assert_eq!(lengths.len(), 13);
        let first = lengths[0];
        assert!(lengths.iter().all(|l| (l - first).abs() < 1e-9 * first));

        let result = IndicatorKind::PathLengthVariance
            .evaluate(&trajectory, &points_at(&trajectory, &indices))
            .unwrap();
        let WindowIndicator::PathLength { variance, .. } = result else {
            panic!("expected path-length output");
        };
        assert!(variance < 1e-12);
    }

    #[test]
    fn test_path_length_needs_three_points() {
        let trajectory = orbit(8000.0, 0.3, 50.0);
        let points = points_at(&trajectory, &[160, 320]);
        assert!(path_lengths(&trajectory, &points).is_err());
    }

    #[test]
    fn test_normalizer_running_and_final() {
        let mut normalizer = PathLengthNormalizer::new();
        assert!(normalizer.normalize(1.0).is_nan());

        let live_first = normalizer.push(0.1, 1.0, &[1.0, 1.0]);
        assert!((live_first - 1.0).abs() < 1e-12);
        let live_second = normalizer.push(0.2, 4.0, &[3.0, 3.0]);
        assert!((live_second - 1.0).abs() < 1e-12);

        // Capture mean is 2.0, so the first window becomes 1/4
        let final_values = normalizer.finalize();
        assert_eq!(final_values.len(), 2);
        assert!((final_values[0].1 - 0.25).abs() < 1e-12);
        assert!((final_values[1].1 - 1.0).abs() < 1e-12);
    }
}
