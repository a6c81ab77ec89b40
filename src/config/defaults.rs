//! System-wide default constants.
//!
//! Values the machine was commissioned with. Grouped by subsystem; every
//! configurable field in [`ChatterConfig`](super::ChatterConfig) defaults to
//! one of these.

// ============================================================================
// Acquisition
// ============================================================================

/// Nominal scan rate per channel (Hz).
pub const SAMPLE_RATE_HZ: f64 = 8_000.0;

/// Period of one acquisition batch (seconds). 0.5 s = 4 000 scans at 8 kHz.
pub const BATCH_SECONDS: f64 = 0.5;

/// X accelerometer sensitivity (V per m/s²), from the sensor calibration sheet.
pub const X_AXIS_SENSITIVITY: f64 = 0.001_156;

/// X accelerometer zero offset (m/s²), measured on the bench.
pub const X_AXIS_OFFSET: f64 = -290.337_933_013_119;

/// Y accelerometer sensitivity (V per m/s²).
pub const Y_AXIS_SENSITIVITY: f64 = 0.001_055;

/// Y accelerometer zero offset (m/s²).
pub const Y_AXIS_OFFSET: f64 = -366.662_803_070_699_17;

/// Value the acquisition driver writes for a missed scan.
pub const MISSED_SAMPLE_SENTINEL: f64 = -9999.0;

/// Fraction of a batch that may be missed before the batch is a fault.
pub const MAX_MISSED_FRACTION: f64 = 0.5;

/// Start-up transient dropped from persisted captures (seconds).
pub const SETTLE_SECONDS: f64 = 1.0;

/// Consecutive failed batch reads after which a session is ended.
pub const MAX_CONSECUTIVE_SOURCE_FAULTS: u32 = 10;

// ============================================================================
// Filter
// ============================================================================

/// High-pass pass-band edge (Hz).
pub const FILTER_PASS_HZ: f64 = 200.0;

/// High-pass stop-band edge (Hz).
pub const FILTER_STOP_HZ: f64 = 150.0;

/// Maximum pass-band loss (dB).
pub const FILTER_PASS_RIPPLE_DB: f64 = 3.0;

/// Minimum stop-band attenuation (dB).
pub const FILTER_STOP_ATTENUATION_DB: f64 = 40.0;

// ============================================================================
// Analysis
// ============================================================================

/// Sliding window length (seconds).
pub const WINDOW_SECONDS: f64 = 0.3;

/// Window advance (seconds).
pub const STEP_SECONDS: f64 = 0.1;

/// Spindle speed used when the machine cannot be asked (rpm).
pub const NOMINAL_RPM: f64 = 3_000.0;

// ============================================================================
// Detection
// ============================================================================

/// Variance-ratio stability threshold.
pub const CHATTER_THRESHOLD: f64 = 0.9;

/// Lobe points recorded per cut.
pub const MAX_POINTS_PER_CUT: usize = 1;

// ============================================================================
// Machine
// ============================================================================

/// Machine X coordinate of the stock's leading edge (mm).
pub const MACHINE_OFFSET_X_MM: f64 = 431.85;

/// Machine Z coordinate of the stock's top face (mm).
pub const MACHINE_OFFSET_Z_MM: f64 = -492.277;

/// Stock length along X (mm).
pub const MATERIAL_LENGTH_X_MM: f64 = 104.648;

/// Entry/exit span excluded from measurement at each stock edge (mm).
pub const EDGE_MARGIN_MM: f64 = 10.0;

/// Incline of the ramped test stock (degrees).
pub const INCLINE_ANGLE_DEG: f64 = 7.0;

/// Machine query timeout (ms).
pub const MACHINE_QUERY_TIMEOUT_MS: u64 = 500;

/// Interval between machine readiness / stop-cycle polls (ms).
pub const MACHINE_POLL_INTERVAL_MS: u64 = 100;

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

// ============================================================================
// Calibration
// ============================================================================

/// Lobe points collected before fitting.
pub const CALIBRATION_POINTS: usize = 8;

/// Minimum lobe points for a determined fit (one per model parameter).
pub const LOBE_PARAMETER_COUNT: usize = 7;

/// Levenberg-Marquardt iteration budget.
pub const FIT_MAX_ITERATIONS: usize = 100_000;

/// Relative cost reduction below which the fit has converged.
pub const FIT_FTOL: f64 = 1e-12;

/// Relative step size below which the fit has converged.
pub const FIT_XTOL: f64 = 1e-12;

/// Largest residual/Jacobian-column cosine accepted as a minimum when no
/// step lowers the cost.
pub const FIT_GTOL: f64 = 1e-4;

/// Lobe curve tabulation range (rpm).
pub const CURVE_RPM_MIN: f64 = 1_000.0;
pub const CURVE_RPM_MAX: f64 = 15_000.0;
pub const CURVE_RPM_STEP: f64 = 10.0;

/// Directory for captures and calibration files.
pub const OUTPUT_DIR: &str = "chatterscope_data";
