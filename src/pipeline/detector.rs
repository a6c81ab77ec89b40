//! Rising-edge threshold detection over the indicator series

use crate::types::ChatterReading;

/// Fires once when the indicator rises to or above the threshold.
///
/// A reading below the threshold re-arms the detector. Before the first
/// reading the series counts as below threshold.
#[derive(Debug, Clone)]
pub struct ThresholdDetector {
    threshold: f64,
    above: bool,
    excursions: usize,
}

impl ThresholdDetector {
    pub const fn new(threshold: f64) -> Self {
        Self {
            threshold,
            above: false,
            excursions: 0,
        }
    }

    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed one reading; `true` on a rising crossing.
    ///
    /// Non-finite values leave the state untouched.
    pub fn observe(&mut self, reading: &ChatterReading) -> bool {
        if !reading.value.is_finite() {
            return false;
        }
        let now_above = reading.value >= self.threshold;
        let rising = now_above && !self.above;
        self.above = now_above;
        if rising {
            self.excursions += 1;
        }
        rising
    }

    pub const fn is_above(&self) -> bool {
        self.above
    }

    /// Number of excursions seen so far.
    pub const fn excursions(&self) -> usize {
        self.excursions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<ChatterReading> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| ChatterReading { t: i as f64 * 0.1, value })
            .collect()
    }

    fn fire_count(detector: &mut ThresholdDetector, values: &[f64]) -> usize {
        series(values).iter().filter(|r| detector.observe(r)).count()
    }

    #[test]
    fn test_single_excursion_fires_once() {
        let mut detector = ThresholdDetector::new(0.9);
        let values = [0.2, 0.3, 0.95, 1.2, 1.4, 0.91, 1.1, 0.4, 0.3];
        assert_eq!(fire_count(&mut detector, &values), 1);
        assert_eq!(detector.excursions(), 1);
        assert!(!detector.is_above());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut detector = ThresholdDetector::new(0.9);
        assert_eq!(fire_count(&mut detector, &[0.5, 0.9]), 1);
    }

    #[test]
    fn test_rearms_after_dropping_below() {
        let mut detector = ThresholdDetector::new(0.9);
        let values = [1.0, 1.0, 0.1, 1.0, 0.1, 0.2, 0.95];
        assert_eq!(fire_count(&mut detector, &values), 3);
    }

    #[test]
    fn test_non_finite_ignored() {
        let mut detector = ThresholdDetector::new(0.9);
        assert_eq!(fire_count(&mut detector, &[1.0, f64::NAN, 1.0]), 1);
    }
}
