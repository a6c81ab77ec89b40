//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse: the raw TOML is first walked as a `toml::Value` tree and
//! every dotted key compared against the known field names, producing
//! warnings with "did you mean?" suggestions. Serde deserialization follows.
//! Unknown keys never reject a file.

use std::collections::HashSet;

use super::ChatterConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path for `ChatterConfig`.
///
/// Maintained by hand alongside chatter_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [acquisition]
        "acquisition",
        "acquisition.sample_rate_hz",
        "acquisition.batch_seconds",
        "acquisition.x_sensitivity",
        "acquisition.x_offset",
        "acquisition.y_sensitivity",
        "acquisition.y_offset",
        "acquisition.sentinel",
        "acquisition.max_missed_fraction",
        "acquisition.settle_seconds",
        // [filter]
        "filter",
        "filter.band",
        "filter.pass_hz",
        "filter.stop_hz",
        "filter.pass_ripple_db",
        "filter.stop_attenuation_db",
        "filter.detrend",
        // [analysis]
        "analysis",
        "analysis.window_seconds",
        "analysis.step_seconds",
        "analysis.indicator",
        "analysis.skip_seconds",
        "analysis.retain_capture",
        "analysis.nominal_rpm",
        // [detection]
        "detection",
        "detection.threshold",
        "detection.max_points_per_cut",
        // [machine]
        "machine",
        "machine.x_offset_mm",
        "machine.z_offset_mm",
        "machine.material_length_mm",
        "machine.edge_margin_mm",
        "machine.incline_deg",
        "machine.geometry",
        "machine.report_inches",
        "machine.query_timeout_ms",
        "machine.poll_interval_ms",
        // [calibration]
        "calibration",
        "calibration.points",
        "calibration.max_iterations",
        "calibration.ftol",
        "calibration.xtol",
        "calibration.gtol",
        "calibration.initial_guess",
        "calibration.output_dir",
        "calibration.curve_rpm_min",
        "calibration.curve_rpm_max",
        "calibration.curve_rpm_step",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.len();
    let b_len = b.len();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Closest known key within edit distance 3. Ties resolve alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Warnings for every key in `raw_toml` that `ChatterConfig` does not define.
///
/// Syntax errors return no warnings; serde reports them afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

fn require_positive(value: f64, name: &str, errors: &mut Vec<String>) {
    // NaN compares false, so test the accepted case
    if !(value.is_finite() && value > 0.0) {
        errors.push(format!("{name} = {value} must be a positive finite number"));
    }
}

/// Range and consistency checks on a parsed config. Every violation is reported.
pub fn validate_ranges(config: &ChatterConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let a = &config.acquisition;
    require_positive(a.sample_rate_hz, "acquisition.sample_rate_hz", &mut errors);
    require_positive(a.batch_seconds, "acquisition.batch_seconds", &mut errors);
    require_positive(a.x_sensitivity, "acquisition.x_sensitivity", &mut errors);
    require_positive(a.y_sensitivity, "acquisition.y_sensitivity", &mut errors);
    if !(0.0..=1.0).contains(&a.max_missed_fraction) {
        errors.push(format!(
            "acquisition.max_missed_fraction = {} must lie in [0, 1]",
            a.max_missed_fraction
        ));
    }
    if !(a.settle_seconds >= 0.0) {
        errors.push(format!(
            "acquisition.settle_seconds = {} cannot be negative",
            a.settle_seconds
        ));
    }

    let an = &config.analysis;
    require_positive(an.window_seconds, "analysis.window_seconds", &mut errors);
    require_positive(an.step_seconds, "analysis.step_seconds", &mut errors);
    require_positive(an.nominal_rpm, "analysis.nominal_rpm", &mut errors);
    if !(an.skip_seconds >= 0.0) {
        errors.push(format!("analysis.skip_seconds = {} cannot be negative", an.skip_seconds));
    }
    if an.window_seconds.is_finite() && an.nominal_rpm.is_finite() && an.nominal_rpm > 0.0 {
        let revolutions = an.window_seconds * an.nominal_rpm / 60.0;
        if revolutions < 2.0 {
            errors.push(format!(
                "analysis.window_seconds = {} spans {revolutions:.2} revolutions at {} rpm, need at least 2",
                an.window_seconds, an.nominal_rpm
            ));
        }
    }

    let d = &config.detection;
    require_positive(d.threshold, "detection.threshold", &mut errors);
    if d.max_points_per_cut == 0 {
        errors.push("detection.max_points_per_cut must be at least 1".to_string());
    }

    let m = &config.machine;
    require_positive(m.material_length_mm, "machine.material_length_mm", &mut errors);
    if !(m.edge_margin_mm >= 0.0) || 2.0 * m.edge_margin_mm >= m.material_length_mm {
        errors.push(format!(
            "machine.edge_margin_mm = {} leaves no measurable span on {} mm of stock",
            m.edge_margin_mm, m.material_length_mm
        ));
    }
    if !(m.incline_deg > 0.0 && m.incline_deg < 90.0) {
        errors.push(format!("machine.incline_deg = {} must lie in (0, 90)", m.incline_deg));
    }
    if m.query_timeout_ms == 0 {
        errors.push("machine.query_timeout_ms must be at least 1".to_string());
    }

    let c = &config.calibration;
    if c.points < super::defaults::LOBE_PARAMETER_COUNT {
        errors.push(format!(
            "calibration.points = {} is below the {} model parameters",
            c.points,
            super::defaults::LOBE_PARAMETER_COUNT
        ));
    }
    if c.max_iterations == 0 {
        errors.push("calibration.max_iterations must be at least 1".to_string());
    }
    require_positive(c.ftol, "calibration.ftol", &mut errors);
    require_positive(c.xtol, "calibration.xtol", &mut errors);
    require_positive(c.gtol, "calibration.gtol", &mut errors);
    if let Some(guess) = &c.initial_guess {
        if guess.iter().any(|v| !v.is_finite()) || guess[0] == 0.0 {
            errors.push("calibration.initial_guess must be finite with a non-zero first entry".to_string());
        }
    }
    require_positive(c.curve_rpm_step, "calibration.curve_rpm_step", &mut errors);
    if !(c.curve_rpm_min > 0.0 && c.curve_rpm_max > c.curve_rpm_min) {
        errors.push(format!(
            "calibration curve range {}..{} rpm is empty",
            c.curve_rpm_min, c.curve_rpm_max
        ));
    }

    errors
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("treshold", "threshold"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [machine]
            incline_deg = 7.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"machine".to_string()));
        assert!(keys.contains(&"machine.incline_deg".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
[detection]
treshold = 0.8
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("treshold"));
        assert_eq!(warnings[0].suggestion.as_deref(), Some("detection.threshold"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let warnings = validate_unknown_keys(
            r#"
[acquisition]
sample_rate_hz = 8000.0

[filter]
band = "highpass"
detrend = "linear"

[calibration]
initial_guess = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
"#,
        );
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_unknown_section_without_close_match() {
        let warnings = validate_unknown_keys("[completely_unrelated_garbage]\nkey = 1\n");
        assert!(!warnings.is_empty());
        assert!(warnings.iter().all(|w| w.suggestion.is_none()));
    }

    #[test]
    fn test_defaults_pass_range_checks() {
        let errors = validate_ranges(&ChatterConfig::default());
        assert!(errors.is_empty(), "Defaults should produce no errors: {errors:?}");
    }

    #[test]
    fn test_range_errors_are_all_reported() {
        let mut config = ChatterConfig::default();
        config.acquisition.sample_rate_hz = 0.0;
        config.detection.max_points_per_cut = 0;
        config.calibration.points = 3;
        config.machine.edge_margin_mm = 60.0;
        let errors = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("sample_rate_hz")));
        assert!(errors.iter().any(|e| e.contains("max_points_per_cut")));
        assert!(errors.iter().any(|e| e.contains("calibration.points")));
        assert!(errors.iter().any(|e| e.contains("edge_margin_mm")));
    }

    #[test]
    fn test_window_shorter_than_two_revolutions_rejected() {
        let mut config = ChatterConfig::default();
        config.analysis.window_seconds = 0.03;
        let errors = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("window_seconds")));
    }
}
