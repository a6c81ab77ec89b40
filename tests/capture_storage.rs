//! Capture Storage Tests
//!
//! Writes a synthetic capture, reads it back with different column layouts,
//! analyses it and writes the merged indicator file.

use chatterscope::acquisition::SyntheticCut;
use chatterscope::config::ChatterConfig;
use chatterscope::pipeline::{analyze_capture, WindowPlan};
use chatterscope::processing::{FilterDesigner, WindowAnalyzer};
use chatterscope::storage::{indicator_column, Capture, ColumnLayout};
use chatterscope::types::Sample;

fn synthetic_capture(seconds: f64) -> Capture {
    let mut cut = SyntheticCut::stable(3000.0, 3);
    let samples = cut
        .generate(0, (seconds * 8000.0) as usize, 8000.0)
        .into_iter()
        .enumerate()
        .map(|(i, (ax, ay))| Sample::new(i as f64 / 8000.0, ax, ay))
        .collect();
    Capture::new(samples)
}

#[test]
fn written_capture_analyses_like_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("capture.csv");
    let merged_path = dir.path().join("capture_chatter.csv");
    let config = ChatterConfig::default();

    let original = synthetic_capture(1.0);
    original.write_csv(&raw_path, None).unwrap();
    let capture = Capture::read_csv(&raw_path, ColumnLayout::default()).unwrap();
    assert_eq!(capture.samples, original.samples);

    let rate = capture.estimate_sample_rate().unwrap();
    assert!((rate - 8000.0).abs() < 10.0);

    let analyzer = WindowAnalyzer::from_config(&mut FilterDesigner::new(), &config, 8000.0, 3000.0).unwrap();
    let plan = WindowPlan::from_seconds(8000.0, 0.3, 0.1).unwrap();
    let report = analyze_capture(&capture.samples, plan, &analyzer);
    assert_eq!(report.readings.len(), 8);

    capture.write_csv(&merged_path, Some(&report.readings)).unwrap();
    let text = std::fs::read_to_string(&merged_path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("time,accel_x,accel_y,chatter_indicator"));

    let merged: Vec<f64> = lines
        .map(|line| line.rsplit(',').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(merged.len(), 8000);
    assert_eq!(merged, indicator_column(&capture.samples, &report.readings));

    // Every row inside the analysed span carries the earliest window covering it
    let last = report.readings.len() - 1;
    let last_end = last * plan.step + plan.window - 1;
    for (row, value) in merged.iter().enumerate() {
        let k = (0..=last)
            .find(|&k| k * plan.step + plan.window - 1 >= row)
            .unwrap_or(last);
        if row <= last_end {
            assert!(k * plan.step <= row, "row {row} outside window {k}");
        }
        assert_eq!(*value, report.readings[k].value, "row {row}");
    }
    // Row 2800 sits in the second window, not the first
    assert_eq!(merged[2800], report.readings[1].value);
    assert_eq!(merged[7999], report.readings[last].value);
}

#[test]
fn column_layout_selects_axes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tzxy.csv");
    std::fs::write(&path, "Time,Z,X,Y\n5.0,1,0.25,-0.5\n5.125,1,0.5,-1\n").unwrap();

    let capture = Capture::read_csv(&path, ColumnLayout::parse("TZXY").unwrap()).unwrap();
    assert_eq!(
        capture.samples,
        vec![Sample::new(0.0, 0.25, -0.5), Sample::new(0.125, 0.5, -1.0)]
    );
}

#[test]
fn settled_capture_drops_leading_second() {
    let capture = synthetic_capture(2.0).trim_settle(1.0).detrend();
    assert_eq!(capture.samples.len(), 8000);
    assert!(capture.samples[0].t >= 1.0);
}
