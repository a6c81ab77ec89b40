//! Pipeline Regression Tests
//!
//! Runs complete captures through the window scheduler with the shipped
//! default configuration: an ideal spindle-synchronous orbit, a stable cut
//! with noise and harmonics, and a cut that develops chatter half way.

use chatterscope::acquisition::{ChatterOnset, SyntheticCut};
use chatterscope::config::ChatterConfig;
use chatterscope::pipeline::{analyze_capture, SampleBuffer, ThresholdDetector, WindowPlan, WindowScheduler};
use chatterscope::processing::{FilterDesigner, WindowAnalyzer};
use chatterscope::types::{ChatterReading, Sample};
use std::f64::consts::PI;

const RATE: f64 = 8000.0;

fn analyzer(config: &ChatterConfig, rpm: f64) -> WindowAnalyzer {
    WindowAnalyzer::from_config(&mut FilterDesigner::new(), config, RATE, rpm).unwrap()
}

fn plan(config: &ChatterConfig) -> WindowPlan {
    WindowPlan::from_seconds(RATE, config.analysis.window_seconds, config.analysis.step_seconds).unwrap()
}

/// Circular orbit at the spindle frequency.
fn orbit(seconds: f64, rpm: f64) -> Vec<Sample> {
    let f = rpm / 60.0;
    (0..(seconds * RATE) as usize)
        .map(|i| {
            let t = i as f64 / RATE;
            Sample::new(t, (2.0 * PI * f * t).sin(), (2.0 * PI * f * t).cos())
        })
        .collect()
}

fn synthetic(mut cut: SyntheticCut, seconds: f64) -> Vec<Sample> {
    cut.generate(0, (seconds * RATE) as usize, RATE)
        .into_iter()
        .enumerate()
        .map(|(i, (ax, ay))| Sample::new(i as f64 / RATE, ax, ay))
        .collect()
}

fn rising_edges(readings: &[ChatterReading], threshold: f64) -> Vec<f64> {
    let mut detector = ThresholdDetector::new(threshold);
    readings
        .iter()
        .filter(|r| detector.observe(r))
        .map(|r| r.t)
        .collect()
}

#[test]
fn periodic_orbit_gives_28_low_readings() {
    let config = ChatterConfig::default();
    let plan = plan(&config);
    assert_eq!((plan.window, plan.step), (2400, 800));

    let report = analyze_capture(&orbit(3.0, 3000.0), plan, &analyzer(&config, 3000.0));

    assert_eq!(report.readings.len(), 28);
    assert_eq!(report.skips.total, 0);
    for r in &report.readings {
        assert!(r.value < config.detection.threshold, "reading {} at t={}", r.value, r.t);
    }
    assert!(report.readings.windows(2).all(|w| w[1].t > w[0].t));
}

#[test]
fn streaming_and_batch_analysis_agree() {
    let config = ChatterConfig::default();
    let samples = orbit(3.0, 3000.0);
    let analyzer = analyzer(&config, 3000.0);
    let batch = analyze_capture(&samples, plan(&config), &analyzer);

    // Half-second batches with bounded retention
    let mut buffer = SampleBuffer::new();
    let mut scheduler = WindowScheduler::new(plan(&config), analyzer);
    let mut streamed = Vec::new();
    for chunk in samples.chunks(4000) {
        buffer.extend(chunk);
        streamed.extend(scheduler.poll(&buffer));
        buffer.discard_before(scheduler.retain_from());
        assert!(buffer.retained() < 2400 + 4000);
    }

    assert_eq!(streamed, batch.readings);
}

#[test]
fn reading_count_follows_window_formula() {
    let config = ChatterConfig::default();
    let plan = plan(&config);
    let analyzer = analyzer(&config, 3000.0);
    let samples = orbit(1.0, 3000.0);

    for n in [0, 2399, 2400, 3199, 3200, 4000, 8000] {
        let report = analyze_capture(&samples[..n], plan, &analyzer);
        let expected = if n < 2400 { 0 } else { (n - 2400) / 800 + 1 };
        assert_eq!(report.readings.len(), expected, "n = {n}");
    }
}

#[test]
fn stable_cut_stays_below_threshold() {
    let config = ChatterConfig::default();
    let samples = synthetic(SyntheticCut::stable(3000.0, 11), 3.0);
    let report = analyze_capture(&samples, plan(&config), &analyzer(&config, 3000.0));

    assert_eq!(report.readings.len(), 28);
    assert!(rising_edges(&report.readings, config.detection.threshold).is_empty());
}

#[test]
fn chatter_onset_fires_exactly_once() {
    let config = ChatterConfig::default();
    let onset = ChatterOnset::default();
    let samples = synthetic(SyntheticCut::chattering(3000.0, onset, 11), 3.0);
    let report = analyze_capture(&samples, plan(&config), &analyzer(&config, 3000.0));

    let edges = rising_edges(&report.readings, config.detection.threshold);
    assert_eq!(edges.len(), 1, "edges at {edges:?}");
    assert!(edges[0] > onset.onset_seconds);

    // Windows entirely before the onset are clearly stable
    for r in report.readings.iter().filter(|r| r.t < onset.onset_seconds) {
        assert!(r.value < 0.5, "pre-onset reading {} at t={}", r.value, r.t);
    }
}
