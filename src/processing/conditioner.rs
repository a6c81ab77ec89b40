//! Detrending and high-pass filtering of one acceleration window

use std::sync::Arc;

use super::DesignedFilter;
use crate::types::DetrendKind;

/// Remove the mean (`Constant`) or the least-squares line against the
/// sample index (`Linear`).
pub fn detrend(signal: &[f64], kind: DetrendKind) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    match kind {
        DetrendKind::Constant => {
            let mean = signal.iter().sum::<f64>() / n as f64;
            signal.iter().map(|v| v - mean).collect()
        }
        DetrendKind::Linear => {
            let (slope, intercept) = linear_fit(signal);
            signal
                .iter()
                .enumerate()
                .map(|(i, v)| v - (intercept + slope * i as f64))
                .collect()
        }
    }
}

/// Least-squares `(slope, intercept)` of `signal` against its index.
pub fn linear_fit(signal: &[f64]) -> (f64, f64) {
    let n = signal.len();
    if n < 2 {
        return (0.0, signal.first().copied().unwrap_or(0.0));
    }
    let nf = n as f64;
    let mean = signal.iter().sum::<f64>() / nf;
    let mean_i = (nf - 1.0) / 2.0;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, v) in signal.iter().enumerate() {
        let di = i as f64 - mean_i;
        sxy += di * (v - mean);
        sxx += di * di;
    }
    let slope = sxy / sxx;
    (slope, mean - slope * mean_i)
}

/// Detrend then filter. Holds no state between windows.
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    filter: Arc<DesignedFilter>,
    detrend: DetrendKind,
}

impl SignalConditioner {
    pub fn new(filter: Arc<DesignedFilter>, detrend: DetrendKind) -> Self {
        Self { filter, detrend }
    }

    pub fn filter(&self) -> &DesignedFilter {
        &self.filter
    }

    pub fn condition(&self, raw: &[f64]) -> Vec<f64> {
        self.condition_with(raw, self.detrend)
    }

    pub fn condition_with(&self, raw: &[f64], kind: DetrendKind) -> Vec<f64> {
        self.filter.sos.apply(&detrend(raw, kind))
    }
}
