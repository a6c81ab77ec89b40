//! Config Validation Tests
//!
//! Loads complete and partial TOML documents through the public config API:
//! typo detection stays a warning, range violations are errors.

use chatterscope::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use chatterscope::config::{ChatterConfig, ConfigError};
use chatterscope::processing::FilterBand;
use chatterscope::types::{CutGeometry, IndicatorKind};

const SHOP_CONFIG: &str = r#"
[acquisition]
sample_rate_hz = 10000.0
settle_seconds = 0.5

[filter]
band = "highpass"
pass_hz = 250.0
stop_hz = 180.0

[analysis]
indicator = "path_length_variance"
window_seconds = 0.4

[detection]
threshold = 0.95

[machine]
geometry = "flat"
z_offset_mm = -480.0

[calibration]
points = 10
"#;

#[test]
fn full_document_overrides_defaults() {
    let config = ChatterConfig::from_toml_str(SHOP_CONFIG).unwrap();
    assert_eq!(config.acquisition.sample_rate_hz, 10_000.0);
    assert_eq!(config.filter.band, FilterBand::Highpass);
    assert_eq!(config.analysis.indicator, IndicatorKind::PathLengthVariance);
    assert_eq!(config.machine.geometry, CutGeometry::Flat);
    assert_eq!(config.calibration.points, 10);
    // Untouched fields keep their defaults
    assert_eq!(config.analysis.step_seconds, ChatterConfig::default().analysis.step_seconds);
}

#[test]
fn typo_is_a_warning_not_an_error() {
    let doc = "[analysis]\nwindow_secnds = 0.4\n";
    let warnings = validate_unknown_keys(doc);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("analysis.window_seconds"));

    let config = ChatterConfig::from_toml_str(doc).unwrap();
    assert_eq!(config, ChatterConfig::default());
}

#[test]
fn every_default_field_is_a_known_key() {
    let doc = ChatterConfig::default().to_toml().unwrap();
    assert!(validate_unknown_keys(&doc).is_empty());
    assert!(known_config_keys().contains("calibration.output_dir"));
    assert_eq!(
        suggest_correction("detection.treshold", &known_config_keys()).as_deref(),
        Some("detection.threshold")
    );
}

#[test]
fn range_violations_fail_validation() {
    let doc = "[detection]\nthreshold = -1.0\n\n[calibration]\npoints = 4\n";
    match ChatterConfig::from_toml_str(doc) {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("detection.threshold")));
            assert!(errors.iter().any(|e| e.contains("calibration.points")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn filter_edges_beyond_nyquist_fail_validation() {
    let doc = "[acquisition]\nsample_rate_hz = 300.0\n";
    assert!(matches!(
        ChatterConfig::from_toml_str(doc),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chatterscope.toml");
    let config = ChatterConfig::from_toml_str(SHOP_CONFIG).unwrap();
    config.save_to_file(&path).unwrap();
    assert_eq!(ChatterConfig::load_from_file(&path).unwrap(), config);
}
