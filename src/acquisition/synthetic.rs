//! Deterministic synthetic cutting signals
//!
//! A stable cut is modelled as spindle-synchronous motion: the rotation
//! frequency plus tooth-pass harmonics, all of which repeat every revolution.
//! Chatter adds a strong component at a frequency that is not a multiple of
//! the rotation frequency, so revolution-sampled points stop repeating.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::{FRAC_PI_2, PI};

/// Harmonics of the spindle frequency present in a stable cut: `(multiple, amplitude)`.
const STABLE_HARMONICS: [(f64, f64); 3] = [(1.0, 1.0), (5.0, 0.3), (8.0, 0.2)];

/// Self-excited vibration switched on part-way through a cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatterOnset {
    pub onset_seconds: f64,
    pub frequency_hz: f64,
    pub amplitude: f64,
}

impl Default for ChatterOnset {
    fn default() -> Self {
        Self {
            onset_seconds: 1.5,
            frequency_hz: 437.3,
            amplitude: 4.0,
        }
    }
}

/// Synthetic two-axis acceleration for one cut.
#[derive(Debug, Clone)]
pub struct SyntheticCut {
    pub rpm: f64,
    pub noise_std: f64,
    pub chatter: Option<ChatterOnset>,
    rng: StdRng,
    noise: Option<Normal<f64>>,
}

impl SyntheticCut {
    pub fn new(rpm: f64, noise_std: f64, chatter: Option<ChatterOnset>, seed: u64) -> Self {
        Self {
            rpm,
            noise_std,
            chatter,
            rng: StdRng::seed_from_u64(seed),
            noise: Normal::new(0.0, noise_std).ok().filter(|_| noise_std > 0.0),
        }
    }

    pub fn stable(rpm: f64, seed: u64) -> Self {
        Self::new(rpm, 0.05, None, seed)
    }

    pub fn chattering(rpm: f64, onset: ChatterOnset, seed: u64) -> Self {
        Self::new(rpm, 0.05, Some(onset), seed)
    }

    fn axis(&self, t: f64, phase: f64) -> f64 {
        let spindle_hz = self.rpm / 60.0;
        let mut value: f64 = STABLE_HARMONICS
            .iter()
            .map(|(k, amp)| amp * (2.0 * PI * k * spindle_hz * t + phase).sin())
            .sum();
        if let Some(c) = self.chatter.filter(|c| t >= c.onset_seconds) {
            value += c.amplitude * (2.0 * PI * c.frequency_hz * t + phase).sin();
        }
        value
    }

    /// `(ax, ay)` at time `t`. Y lags X by a quarter period.
    pub fn accel_at(&mut self, t: f64) -> (f64, f64) {
        let (mut ax, mut ay) = (self.axis(t, 0.0), self.axis(t, FRAC_PI_2));
        if let Some(noise) = self.noise {
            ax += noise.sample(&mut self.rng);
            ay += noise.sample(&mut self.rng);
        }
        (ax, ay)
    }

    /// `count` consecutive accelerations starting at scan `first_scan`.
    pub fn generate(&mut self, first_scan: u64, count: usize, sample_rate_hz: f64) -> Vec<(f64, f64)> {
        (0..count as u64)
            .map(|j| self.accel_at((first_scan + j) as f64 / sample_rate_hz))
            .collect()
    }
}
