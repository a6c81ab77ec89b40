//! Closed-form stability limit and fitted-model evaluation

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::types::LobePoint;

/// Number of real model parameters.
pub const PARAMETER_COUNT: usize = 7;

pub const PARAMETER_NAMES: [&str; PARAMETER_COUNT] = ["x1", "x2", "x3", "x4", "c2", "c3", "c4"];

/// Limiting stable depth at `rpm`. Unbounded where the real part is non-negative.
pub fn stability_limit(rpm: f64, p: &[f64; PARAMETER_COUNT]) -> f64 {
    let [x1, x2, x3, x4, c2, c3, c4] = *p;
    let i = Complex64::i();
    let stiffness = Complex64::new(x3, c3);
    let denominator =
        i * rpm * rpm / stiffness + Complex64::new(x4, c4) * i * rpm / stiffness + 1.0;
    let response = -Complex64::new(x2, c2) / denominator;

    let real = response.re.min(0.0);
    if real == 0.0 {
        return f64::INFINITY;
    }
    1.0 / (2.0 * x1 * real.abs())
}

/// Fitted stability-lobe curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobeModel {
    pub params: [f64; PARAMETER_COUNT],
    /// Sum of squared depth residuals at the fitted points
    pub residual: f64,
    pub iterations: usize,
    pub points: usize,
}

impl LobeModel {
    pub fn from_params(params: [f64; PARAMETER_COUNT]) -> Self {
        Self {
            params,
            residual: 0.0,
            iterations: 0,
            points: 0,
        }
    }

    pub fn depth_at(&self, rpm: f64) -> f64 {
        stability_limit(rpm, &self.params)
    }

    /// Tabulate `[lo, hi)` in steps of `step` rpm.
    pub fn curve(&self, lo: f64, hi: f64, step: f64) -> Vec<LobePoint> {
        if !(step > 0.0) || !(hi > lo) {
            return Vec::new();
        }
        let count = ((hi - lo) / step).ceil() as usize;
        (0..count)
            .map(|k| {
                let rpm = lo + k as f64 * step;
                LobePoint::new(rpm, self.depth_at(rpm))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUTH: [f64; 7] = [1.0, -1.0, 0.0, 0.0, 0.0, -2900.0 * 2900.0, -290.0];

    #[test]
    fn test_reference_values() {
        let expected = [
            (2950.0, 0.166_150_695_65),
            (3000.0, 0.111_348_475_38),
            (3300.0, 0.169_399_164_78),
        ];
        for (rpm, depth) in expected {
            let value = stability_limit(rpm, &TRUTH);
            assert!((value - depth).abs() < 1e-9, "{rpm}: {value}");
        }
    }

    #[test]
    fn test_positive_real_part_is_unbounded() {
        let flipped = [1.0, 1.0, 0.0, 0.0, 0.0, -2900.0 * 2900.0, -290.0];
        assert!(stability_limit(3000.0, &flipped).is_infinite());
    }

    #[test]
    fn test_curve_tabulation() {
        let model = LobeModel::from_params(TRUTH);
        let curve = model.curve(1000.0, 15_000.0, 10.0);
        assert_eq!(curve.len(), 1400);
        assert!((curve[0].rpm - 1000.0).abs() < f64::EPSILON);
        assert!((curve[200].depth - model.depth_at(3000.0)).abs() < 1e-12);
        assert!(model.curve(10.0, 5.0, 1.0).is_empty());
        assert!(model.curve(0.0, 5.0, 0.0).is_empty());
    }
}
