//! Chatterscope Configuration - every operating parameter as a TOML value
//!
//! Each section implements `Default` with the commissioning values from
//! [`defaults`](super::defaults), so a missing file or a partial file behaves
//! exactly like the built-in setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::processing::{FilterBand, FilterRequirements};
use crate::types::{CutGeometry, DetrendKind, IndicatorKind};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "CHATTERSCOPE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "chatterscope.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `ChatterConfig::load()` which searches:
/// 1. `$CHATTERSCOPE_CONFIG`
/// 2. `./chatterscope.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatterConfig {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub machine: MachineConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl ChatterConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Check every range and consistency rule, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = super::validation::validate_ranges(self);

        if let Err(e) = self.filter.requirements(self.acquisition.sample_rate_hz).validate() {
            errors.push(format!("filter: {e}"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Acquisition
// ============================================================================

/// Accelerometer channels and stream pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Scan rate per channel (Hz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,

    /// One batch is read per period (seconds)
    #[serde(default = "default_batch_seconds")]
    pub batch_seconds: f64,

    /// X channel sensitivity (V per m/s²)
    #[serde(default = "default_x_sensitivity")]
    pub x_sensitivity: f64,

    /// X channel offset subtracted after scaling (m/s²)
    #[serde(default = "default_x_offset")]
    pub x_offset: f64,

    #[serde(default = "default_y_sensitivity")]
    pub y_sensitivity: f64,

    #[serde(default = "default_y_offset")]
    pub y_offset: f64,

    /// Raw value marking a missed scan
    #[serde(default = "default_sentinel")]
    pub sentinel: f64,

    /// Missed fraction of a batch above which the batch is a fault
    #[serde(default = "default_max_missed_fraction")]
    pub max_missed_fraction: f64,

    /// Leading seconds dropped from persisted captures
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: f64,
}

fn default_sample_rate() -> f64 { defaults::SAMPLE_RATE_HZ }
fn default_batch_seconds() -> f64 { defaults::BATCH_SECONDS }
fn default_x_sensitivity() -> f64 { defaults::X_AXIS_SENSITIVITY }
fn default_x_offset() -> f64 { defaults::X_AXIS_OFFSET }
fn default_y_sensitivity() -> f64 { defaults::Y_AXIS_SENSITIVITY }
fn default_y_offset() -> f64 { defaults::Y_AXIS_OFFSET }
fn default_sentinel() -> f64 { defaults::MISSED_SAMPLE_SENTINEL }
fn default_max_missed_fraction() -> f64 { defaults::MAX_MISSED_FRACTION }
fn default_settle_seconds() -> f64 { defaults::SETTLE_SECONDS }

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: default_sample_rate(),
            batch_seconds: default_batch_seconds(),
            x_sensitivity: default_x_sensitivity(),
            x_offset: default_x_offset(),
            y_sensitivity: default_y_sensitivity(),
            y_offset: default_y_offset(),
            sentinel: default_sentinel(),
            max_missed_fraction: default_max_missed_fraction(),
            settle_seconds: default_settle_seconds(),
        }
    }
}

impl AcquisitionConfig {
    /// Scans per batch, `round(rate * batch_seconds)`.
    pub fn scans_per_batch(&self) -> usize {
        (self.sample_rate_hz * self.batch_seconds).round() as usize
    }
}

// ============================================================================
// Filter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub band: FilterBand,

    #[serde(default = "default_pass_hz")]
    pub pass_hz: f64,

    #[serde(default = "default_stop_hz")]
    pub stop_hz: f64,

    #[serde(default = "default_pass_ripple_db")]
    pub pass_ripple_db: f64,

    #[serde(default = "default_stop_attenuation_db")]
    pub stop_attenuation_db: f64,

    /// Detrend applied before filtering
    #[serde(default)]
    pub detrend: DetrendKind,
}

fn default_pass_hz() -> f64 { defaults::FILTER_PASS_HZ }
fn default_stop_hz() -> f64 { defaults::FILTER_STOP_HZ }
fn default_pass_ripple_db() -> f64 { defaults::FILTER_PASS_RIPPLE_DB }
fn default_stop_attenuation_db() -> f64 { defaults::FILTER_STOP_ATTENUATION_DB }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            band: FilterBand::default(),
            pass_hz: default_pass_hz(),
            stop_hz: default_stop_hz(),
            pass_ripple_db: default_pass_ripple_db(),
            stop_attenuation_db: default_stop_attenuation_db(),
            detrend: DetrendKind::default(),
        }
    }
}

impl FilterConfig {
    pub fn requirements(&self, sample_rate_hz: f64) -> FilterRequirements {
        FilterRequirements {
            band: self.band,
            pass_hz: self.pass_hz,
            stop_hz: self.stop_hz,
            pass_ripple_db: self.pass_ripple_db,
            stop_attenuation_db: self.stop_attenuation_db,
            sample_rate_hz,
        }
    }
}

// ============================================================================
// Analysis
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f64,

    #[serde(default = "default_step_seconds")]
    pub step_seconds: f64,

    #[serde(default)]
    pub indicator: IndicatorKind,

    /// Leading seconds of a live session left unanalysed
    #[serde(default)]
    pub skip_seconds: f64,

    /// Keep a full copy of the capture for persistence
    #[serde(default = "default_true")]
    pub retain_capture: bool,

    /// Spindle speed assumed when the machine cannot be queried (rpm)
    #[serde(default = "default_nominal_rpm")]
    pub nominal_rpm: f64,
}

fn default_window_seconds() -> f64 { defaults::WINDOW_SECONDS }
fn default_step_seconds() -> f64 { defaults::STEP_SECONDS }
fn default_nominal_rpm() -> f64 { defaults::NOMINAL_RPM }
fn default_true() -> bool { true }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            step_seconds: default_step_seconds(),
            indicator: IndicatorKind::default(),
            skip_seconds: 0.0,
            retain_capture: true,
            nominal_rpm: default_nominal_rpm(),
        }
    }
}

// ============================================================================
// Detection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Indicator value at or above which a window counts as chatter
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Lobe points recorded per cut (one recording session)
    #[serde(default = "default_max_points_per_cut")]
    pub max_points_per_cut: usize,
}

fn default_threshold() -> f64 { defaults::CHATTER_THRESHOLD }
fn default_max_points_per_cut() -> usize { defaults::MAX_POINTS_PER_CUT }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_points_per_cut: default_max_points_per_cut(),
        }
    }
}

// ============================================================================
// Machine
// ============================================================================

/// Workpiece placement and machine query behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Machine X of the stock's leading edge (mm)
    #[serde(default = "default_x_offset_mm")]
    pub x_offset_mm: f64,

    /// Machine Z of the stock's top face (mm)
    #[serde(default = "default_z_offset_mm")]
    pub z_offset_mm: f64,

    #[serde(default = "default_material_length_mm")]
    pub material_length_mm: f64,

    /// Excluded span at each stock edge (mm)
    #[serde(default = "default_edge_margin_mm")]
    pub edge_margin_mm: f64,

    #[serde(default = "default_incline_deg")]
    pub incline_deg: f64,

    #[serde(default)]
    pub geometry: CutGeometry,

    /// Report depth of cut in inches instead of millimetres
    #[serde(default = "default_true")]
    pub report_inches: bool,

    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_x_offset_mm() -> f64 { defaults::MACHINE_OFFSET_X_MM }
fn default_z_offset_mm() -> f64 { defaults::MACHINE_OFFSET_Z_MM }
fn default_material_length_mm() -> f64 { defaults::MATERIAL_LENGTH_X_MM }
fn default_edge_margin_mm() -> f64 { defaults::EDGE_MARGIN_MM }
fn default_incline_deg() -> f64 { defaults::INCLINE_ANGLE_DEG }
fn default_query_timeout_ms() -> u64 { defaults::MACHINE_QUERY_TIMEOUT_MS }
fn default_poll_interval_ms() -> u64 { defaults::MACHINE_POLL_INTERVAL_MS }

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            x_offset_mm: default_x_offset_mm(),
            z_offset_mm: default_z_offset_mm(),
            material_length_mm: default_material_length_mm(),
            edge_margin_mm: default_edge_margin_mm(),
            incline_deg: default_incline_deg(),
            geometry: CutGeometry::default(),
            report_inches: true,
            query_timeout_ms: default_query_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// ============================================================================
// Calibration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Lobe points to collect before fitting
    #[serde(default = "default_points")]
    pub points: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_ftol")]
    pub ftol: f64,

    #[serde(default = "default_xtol")]
    pub xtol: f64,

    #[serde(default = "default_gtol")]
    pub gtol: f64,

    /// Starting parameters `[x1, x2, x3, x4, c2, c3, c4]`; seeded from the
    /// lobe points when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_guess: Option<[f64; 7]>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_curve_rpm_min")]
    pub curve_rpm_min: f64,

    #[serde(default = "default_curve_rpm_max")]
    pub curve_rpm_max: f64,

    #[serde(default = "default_curve_rpm_step")]
    pub curve_rpm_step: f64,
}

fn default_points() -> usize { defaults::CALIBRATION_POINTS }
fn default_max_iterations() -> usize { defaults::FIT_MAX_ITERATIONS }
fn default_ftol() -> f64 { defaults::FIT_FTOL }
fn default_xtol() -> f64 { defaults::FIT_XTOL }
fn default_gtol() -> f64 { defaults::FIT_GTOL }
fn default_output_dir() -> PathBuf { PathBuf::from(defaults::OUTPUT_DIR) }
fn default_curve_rpm_min() -> f64 { defaults::CURVE_RPM_MIN }
fn default_curve_rpm_max() -> f64 { defaults::CURVE_RPM_MAX }
fn default_curve_rpm_step() -> f64 { defaults::CURVE_RPM_STEP }

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            points: default_points(),
            max_iterations: default_max_iterations(),
            ftol: default_ftol(),
            xtol: default_xtol(),
            gtol: default_gtol(),
            initial_guess: None,
            output_dir: default_output_dir(),
            curve_rpm_min: default_curve_rpm_min(),
            curve_rpm_max: default_curve_rpm_max(),
            curve_rpm_step: default_curve_rpm_step(),
        }
    }
}
