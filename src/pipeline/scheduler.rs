//! Sliding-window scheduler over a growing sample buffer
//!
//! ```text
//!   WaitingForData ──(window end ≤ buffer len)──► Ready ──analyse──┐
//!         ▲                                                        │
//!         └───────────────────── advance windex ◄──────────────────┘
//! ```
//!
//! A window is ready once every one of its samples has been appended. Tail
//! samples shorter than one window are never analysed.

use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::SampleBuffer;
use crate::processing::{PathLengthNormalizer, ProcessingError, WindowAnalysis, WindowAnalyzer, WindowIndicator};
use crate::types::{ChatterReading, IndicatorKind, Sample, Window};

// ============================================================================
// Window Plan
// ============================================================================

/// Window length and step in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    pub window: usize,
    pub step: usize,
}

impl WindowPlan {
    pub fn new(window: usize, step: usize) -> Result<Self, ProcessingError> {
        if window < 2 || step == 0 {
            return Err(ProcessingError::InvalidWindowPlan(format!(
                "window={window} samples, step={step} samples (need window >= 2, step >= 1)"
            )));
        }
        Ok(Self { window, step })
    }

    /// `round(rate * seconds)` for both window and step.
    pub fn from_seconds(
        sample_rate_hz: f64,
        window_seconds: f64,
        step_seconds: f64,
    ) -> Result<Self, ProcessingError> {
        let values = [sample_rate_hz, window_seconds, step_seconds];
        if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(ProcessingError::InvalidWindowPlan(format!(
                "rate={sample_rate_hz} Hz, window={window_seconds} s, step={step_seconds} s"
            )));
        }
        Self::new(
            (sample_rate_hz * window_seconds).round() as usize,
            (sample_rate_hz * step_seconds).round() as usize,
        )
    }

    pub const fn window_at(&self, windex: usize) -> Window {
        let start = windex * self.step;
        Window::new(start, start + self.window)
    }

    /// Number of complete windows in `samples` samples.
    pub const fn window_count(&self, samples: usize) -> usize {
        if samples < self.window {
            0
        } else {
            (samples - self.window) / self.step + 1
        }
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Windows skipped, by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipStats {
    pub total: usize,
    pub by_reason: BTreeMap<&'static str, usize>,
}

impl SkipStats {
    pub fn record(&mut self, error: &ProcessingError) {
        self.total += 1;
        *self.by_reason.entry(error.reason()).or_default() += 1;
    }

    pub fn merge(&mut self, other: &Self) {
        self.total += other.total;
        for (reason, count) in &other.by_reason {
            *self.by_reason.entry(*reason).or_default() += count;
        }
    }
}

impl std::fmt::Display for SkipStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.total)?;
        if !self.by_reason.is_empty() {
            let parts: Vec<String> = self.by_reason.iter().map(|(r, c)| format!("{r}={c}")).collect();
            write!(f, " ({})", parts.join(", "))?;
        }
        Ok(())
    }
}

/// Outcome of a finished schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    pub readings: Vec<ChatterReading>,
    pub windows_analyzed: usize,
    pub skips: SkipStats,
}

// ============================================================================
// Scheduler
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    WaitingForData,
    Ready,
}

/// Emits one [`ChatterReading`] per complete window, in window order.
pub struct WindowScheduler {
    plan: WindowPlan,
    analyzer: WindowAnalyzer,
    first_windex: usize,
    windex: usize,
    state: SchedulerState,
    readings: Vec<ChatterReading>,
    normalizer: PathLengthNormalizer,
    skips: SkipStats,
}

impl WindowScheduler {
    pub fn new(plan: WindowPlan, analyzer: WindowAnalyzer) -> Self {
        Self {
            plan,
            analyzer,
            first_windex: 0,
            windex: 0,
            state: SchedulerState::WaitingForData,
            readings: Vec::new(),
            normalizer: PathLengthNormalizer::new(),
            skips: SkipStats::default(),
        }
    }

    /// Leave every window that starts before `first_sample` unanalysed.
    pub fn starting_at_sample(mut self, first_sample: usize) -> Self {
        self.first_windex = first_sample.div_ceil(self.plan.step);
        self.windex = self.first_windex;
        self
    }

    pub const fn plan(&self) -> WindowPlan {
        self.plan
    }

    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Index of the next window to analyse.
    pub const fn windex(&self) -> usize {
        self.windex
    }

    pub fn readings(&self) -> &[ChatterReading] {
        &self.readings
    }

    pub const fn skips(&self) -> &SkipStats {
        &self.skips
    }

    /// Oldest absolute sample index any future window can read.
    pub const fn retain_from(&self) -> usize {
        self.plan.window_at(self.windex).start
    }

    fn update_state(&mut self, buffer_len: usize) {
        self.state = if self.plan.window_at(self.windex).end <= buffer_len {
            SchedulerState::Ready
        } else {
            SchedulerState::WaitingForData
        };
    }

    /// Analyse every window that is now complete. Returns the new readings.
    pub fn poll(&mut self, buffer: &SampleBuffer) -> Vec<ChatterReading> {
        let mut emitted = Vec::new();
        self.update_state(buffer.len());

        while self.state == SchedulerState::Ready {
            let window = self.plan.window_at(self.windex);
            let result = match buffer.window(window) {
                Some(samples) => self.analyzer.analyze(samples),
                None => Err(ProcessingError::InsufficientSamples {
                    needed: window.len(),
                    available: buffer.retained(),
                }),
            };

            match result {
                Ok(analysis) => {
                    let reading = self.to_reading(analysis);
                    self.readings.push(reading);
                    emitted.push(reading);
                }
                Err(e) => self.skip(self.windex, &e),
            }

            self.windex += 1;
            self.update_state(buffer.len());
        }
        emitted
    }

    fn to_reading(&mut self, analysis: WindowAnalysis) -> ChatterReading {
        let value = match analysis.indicator {
            WindowIndicator::Ratio(value) => value,
            WindowIndicator::PathLength { variance, lengths } => {
                self.normalizer.push(analysis.t, variance, &lengths)
            }
        };
        ChatterReading { t: analysis.t, value }
    }

    fn skip(&mut self, windex: usize, error: &ProcessingError) {
        if error.is_per_window() {
            debug!(windex, reason = error.reason(), "Skipping window: {}", error);
        } else {
            warn!(windex, reason = error.reason(), "Skipping window: {}", error);
        }
        self.skips.record(error);
    }

    /// End the schedule. Path-length readings are renormalised by the
    /// capture-wide mean; variance-ratio readings are returned unchanged.
    pub fn finalize(self) -> ScheduleReport {
        let readings = match self.analyzer.indicator_kind() {
            IndicatorKind::VarianceRatio => self.readings,
            IndicatorKind::PathLengthVariance => self
                .normalizer
                .finalize()
                .into_iter()
                .map(|(t, value)| ChatterReading { t, value })
                .collect(),
        };
        ScheduleReport {
            windows_analyzed: self.windex - self.first_windex,
            readings,
            skips: self.skips,
        }
    }
}

// ============================================================================
// Batch analysis
// ============================================================================

/// Analyse a complete capture, windows in parallel, readings in window order.
pub fn analyze_capture(samples: &[Sample], plan: WindowPlan, analyzer: &WindowAnalyzer) -> ScheduleReport {
    let count = plan.window_count(samples.len());
    let results: Vec<Result<WindowAnalysis, ProcessingError>> = (0..count)
        .into_par_iter()
        .map(|windex| analyzer.analyze(&samples[plan.window_at(windex).range()]))
        .collect();

    let mut skips = SkipStats::default();
    let mut ratios = Vec::with_capacity(count);
    let mut normalizer = PathLengthNormalizer::new();
    for (windex, result) in results.into_iter().enumerate() {
        match result {
            Ok(analysis) => match analysis.indicator {
                WindowIndicator::Ratio(value) => ratios.push(ChatterReading { t: analysis.t, value }),
                WindowIndicator::PathLength { variance, lengths } => {
                    normalizer.push(analysis.t, variance, &lengths);
                }
            },
            Err(e) => {
                debug!(windex, reason = e.reason(), "Skipping window: {}", e);
                skips.record(&e);
            }
        }
    }

    let mut readings = ratios;
    readings.extend(
        normalizer
            .finalize()
            .into_iter()
            .map(|(t, value)| ChatterReading { t, value }),
    );

    info!(
        windows = count,
        readings = readings.len(),
        skipped = skips.total,
        indicator = %analyzer.indicator_kind(),
        "Capture analysed"
    );
    ScheduleReport {
        readings,
        windows_analyzed: count,
        skips,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{FilterBand, FilterDesigner, FilterRequirements, RevolutionClock, SignalConditioner};
    use crate::types::DetrendKind;
    use std::f64::consts::PI;

    fn analyzer(kind: IndicatorKind) -> WindowAnalyzer {
        let filter = FilterDesigner::new()
            .design(&FilterRequirements {
                band: FilterBand::Highpass,
                pass_hz: 10.0,
                stop_hz: 2.0,
                pass_ripple_db: 3.0,
                stop_attenuation_db: 40.0,
                sample_rate_hz: 8000.0,
            })
            .unwrap();
        WindowAnalyzer::new(
            SignalConditioner::new(filter, DetrendKind::Linear),
            RevolutionClock::new(3000.0).unwrap(),
            kind,
        )
    }

    fn capture(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let t = i as f64 / 8000.0;
                Sample::new(t, (2.0 * PI * 50.0 * t).sin(), (2.0 * PI * 50.0 * t).cos())
            })
            .collect()
    }

    #[test]
    fn test_plan_from_seconds() {
        let plan = WindowPlan::from_seconds(8000.0, 0.3, 0.1).unwrap();
        assert_eq!(plan, WindowPlan { window: 2400, step: 800 });
        assert_eq!(plan.window_count(24_000), 28);
        assert_eq!(plan.window_count(2400), 1);
        assert_eq!(plan.window_count(2399), 0);
        assert!(WindowPlan::from_seconds(8000.0, 0.0, 0.1).is_err());
        assert!(WindowPlan::new(100, 0).is_err());
    }

    #[test]
    fn test_window_count_formula() {
        for (window, step) in [(5, 1), (5, 5), (7, 3), (10, 20)] {
            let plan = WindowPlan::new(window, step).unwrap();
            for n in 0..60 {
                let brute = (0..).take_while(|k| k * step + window <= n).count();
                assert_eq!(plan.window_count(n), brute, "W={window} S={step} N={n}");
            }
        }
    }

    #[test]
    fn test_incremental_poll_matches_batch() {
        let plan = WindowPlan::from_seconds(8000.0, 0.3, 0.1).unwrap();
        let samples = capture(8000);
        let analyzer = analyzer(IndicatorKind::VarianceRatio);

        let mut scheduler = WindowScheduler::new(plan, analyzer.clone());
        let mut buffer = SampleBuffer::new();
        let mut emitted = 0;
        for batch in samples.chunks(4000) {
            buffer.extend(batch);
            emitted += scheduler.poll(&buffer).len();
            buffer.discard_before(scheduler.retain_from());
            assert_eq!(scheduler.state(), SchedulerState::WaitingForData);
        }
        let live = scheduler.finalize();
        let batch = analyze_capture(&samples, plan, &analyzer);

        assert_eq!(emitted, plan.window_count(8000));
        assert_eq!(live.readings.len(), batch.readings.len());
        for (a, b) in live.readings.iter().zip(&batch.readings) {
            assert!((a.t - b.t).abs() < 1e-12);
            assert!((a.value - b.value).abs() < 1e-12);
        }
    }

    #[test]
    fn test_start_offset_skips_leading_windows() {
        let plan = WindowPlan::from_seconds(8000.0, 0.3, 0.1).unwrap();
        let buffer = SampleBuffer::from_samples(capture(24_000));
        // 1 s = 8000 samples = 10 steps
        let mut scheduler =
            WindowScheduler::new(plan, analyzer(IndicatorKind::VarianceRatio)).starting_at_sample(8000);
        assert_eq!(scheduler.retain_from(), 8000);

        let readings = scheduler.poll(&buffer);
        assert_eq!(readings.len(), plan.window_count(24_000) - 10);
        assert!(readings[0].t > 1.0);
        assert_eq!(scheduler.finalize().windows_analyzed, 18);
    }

    #[test]
    fn test_short_capture_yields_nothing() {
        let plan = WindowPlan::from_seconds(8000.0, 0.3, 0.1).unwrap();
        let report = analyze_capture(&capture(2000), plan, &analyzer(IndicatorKind::VarianceRatio));
        assert!(report.readings.is_empty());
        assert_eq!(report.windows_analyzed, 0);
    }

    #[test]
    fn test_degenerate_windows_are_counted_not_fatal() {
        // Silent first half, sine second half
        let plan = WindowPlan::from_seconds(8000.0, 0.3, 0.1).unwrap();
        let mut samples = capture(16_000);
        for s in samples.iter_mut().take(8000) {
            s.ax = 0.0;
            s.ay = 0.0;
        }
        let report = analyze_capture(&samples, plan, &analyzer(IndicatorKind::VarianceRatio));
        assert_eq!(report.windows_analyzed, plan.window_count(16_000));
        assert!(report.skips.total > 0);
        assert_eq!(report.readings.len() + report.skips.total, report.windows_analyzed);
        assert!(report.readings.windows(2).all(|w| w[1].t > w[0].t));
    }

    #[test]
    fn test_path_length_readings_are_capture_normalised() {
        let plan = WindowPlan::from_seconds(8000.0, 0.3, 0.1).unwrap();
        let report = analyze_capture(&capture(8000), plan, &analyzer(IndicatorKind::PathLengthVariance));
        assert_eq!(report.readings.len(), plan.window_count(8000));
        assert!(report.readings.iter().all(|r| r.value.is_finite() && r.value >= 0.0));
    }
}
