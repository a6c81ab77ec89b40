//! Full per-window stage chain

use super::{
    integrate_trajectory, FilterDesigner, PoincareSampler, ProcessingError, RevolutionClock, SignalConditioner,
    WindowIndicator,
};
use crate::config::ChatterConfig;
use crate::types::{IndicatorKind, Sample};

/// Result of analysing one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAnalysis {
    /// Time of the window's last sample
    pub t: f64,
    pub bisection_points: usize,
    pub indicator: WindowIndicator,
}

/// Conditions, integrates, samples and scores one window of samples.
///
/// Stateless between calls; cloned freely across worker threads.
#[derive(Debug, Clone)]
pub struct WindowAnalyzer {
    conditioner: SignalConditioner,
    clock: RevolutionClock,
    indicator: IndicatorKind,
}

impl WindowAnalyzer {
    pub fn new(conditioner: SignalConditioner, clock: RevolutionClock, indicator: IndicatorKind) -> Self {
        Self {
            conditioner,
            clock,
            indicator,
        }
    }

    /// Stage chain described by `config` for one spindle speed.
    pub fn from_config(
        designer: &mut FilterDesigner,
        config: &ChatterConfig,
        sample_rate_hz: f64,
        rpm: f64,
    ) -> Result<Self, ProcessingError> {
        let filter = designer.design(&config.filter.requirements(sample_rate_hz))?;
        Ok(Self::new(
            SignalConditioner::new(filter, config.filter.detrend),
            RevolutionClock::new(rpm)?,
            config.analysis.indicator,
        ))
    }

    pub const fn clock(&self) -> &RevolutionClock {
        &self.clock
    }

    pub const fn indicator_kind(&self) -> IndicatorKind {
        self.indicator
    }

    pub fn analyze(&self, window: &[Sample]) -> Result<WindowAnalysis, ProcessingError> {
        let Some(last) = window.last() else {
            return Err(ProcessingError::InsufficientSamples { needed: 2, available: 0 });
        };
        let time: Vec<f64> = window.iter().map(|s| s.t).collect();
        let ax: Vec<f64> = window.iter().map(|s| s.ax).collect();
        let ay: Vec<f64> = window.iter().map(|s| s.ay).collect();

        let trajectory = integrate_trajectory(
            &time,
            &self.conditioner.condition(&ax),
            &self.conditioner.condition(&ay),
        )?;

        let boundaries = self.clock.mark_boundaries(&trajectory.time);
        if boundaries.is_empty() {
            return Err(ProcessingError::InsufficientSamples {
                needed: (self.clock.period() / mean_step(&time)).ceil() as usize + 1,
                available: window.len(),
            });
        }
        let points = PoincareSampler::collect(&trajectory, &boundaries);
        let indicator = self.indicator.evaluate(&trajectory, &points)?;

        Ok(WindowAnalysis {
            t: last.t,
            bisection_points: points.len(),
            indicator,
        })
    }
}

fn mean_step(time: &[f64]) -> f64 {
    match (time.first(), time.last()) {
        (Some(first), Some(last)) if time.len() > 1 => (last - first) / (time.len() - 1) as f64,
        _ => f64::INFINITY,
    }
}
