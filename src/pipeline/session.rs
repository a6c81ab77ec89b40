//! Session context: lobe points owned per cut and per calibration run
//!
//! Nothing here is global. A [`CutSession`] lives for one recording session
//! and is owned by the processing loop; a [`CalibrationSession`] outlives the
//! cuts and absorbs each cut's points when it ends.

use tracing::{debug, info, warn};

use super::{ScheduleReport, ThresholdDetector};
use crate::lobe::{FitError, LobeFitter, LobeModel};
use crate::machine::MachineQueryError;
use crate::storage::Capture;
use crate::types::{ChatterReading, LobePoint};

// ============================================================================
// Per-cut state
// ============================================================================

/// Rising-edge detection plus lobe-point bookkeeping for one cut.
#[derive(Debug, Clone)]
pub struct CutSession {
    detector: ThresholdDetector,
    max_points: usize,
    pending: usize,
    points: Vec<LobePoint>,
    outside_span: usize,
    query_failures: usize,
}

impl CutSession {
    pub fn new(threshold: f64, max_points: usize) -> Self {
        Self {
            detector: ThresholdDetector::new(threshold),
            max_points,
            pending: 0,
            points: Vec::new(),
            outside_span: 0,
            query_failures: 0,
        }
    }

    /// Feed one reading. `true` when a lobe-point measurement should start.
    ///
    /// Measurements already in flight count against the per-cut limit.
    pub fn observe(&mut self, reading: &ChatterReading) -> bool {
        if !self.detector.observe(reading) {
            return false;
        }
        if self.points.len() + self.pending >= self.max_points {
            debug!(t = reading.t, value = reading.value, "Chatter onset ignored, cut already measured");
            return false;
        }
        info!(t = reading.t, value = reading.value, "Chatter onset detected");
        self.pending += 1;
        true
    }

    /// Outcome of a measurement started by [`observe`](Self::observe).
    pub fn resolve(&mut self, outcome: Result<Option<LobePoint>, MachineQueryError>) {
        self.pending = self.pending.saturating_sub(1);
        match outcome {
            Ok(Some(point)) => {
                info!(rpm = point.rpm, depth = point.depth, "Lobe point recorded");
                self.points.push(point);
            }
            Ok(None) => {
                debug!("Tool outside measurement span, no lobe point");
                self.outside_span += 1;
            }
            Err(e) => {
                warn!(error = %e, "Lobe point skipped, machine query failed");
                self.query_failures += 1;
            }
        }
    }

    pub fn points(&self) -> &[LobePoint] {
        &self.points
    }

    pub const fn pending(&self) -> usize {
        self.pending
    }

    pub const fn excursions(&self) -> usize {
        self.detector.excursions()
    }

    pub const fn outside_span(&self) -> usize {
        self.outside_span
    }

    pub const fn query_failures(&self) -> usize {
        self.query_failures
    }

    pub fn into_points(self) -> Vec<LobePoint> {
        self.points
    }
}

// ============================================================================
// Session report
// ============================================================================

/// Why a recording session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// External cancellation
    Cancelled,
    /// The machine reported stop-cycle
    MotionStopped,
    /// The source has no more data
    SourceExhausted,
    /// The source kept failing
    SourceFailed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::MotionStopped => write!(f, "motion stopped"),
            StopReason::SourceExhausted => write!(f, "source exhausted"),
            StopReason::SourceFailed => write!(f, "source failed"),
        }
    }
}

/// Everything one recording session produced.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub rpm: f64,
    pub batches: u64,
    pub samples: usize,
    pub rejected_samples: usize,
    pub source_faults: u64,
    pub schedule: ScheduleReport,
    pub excursions: usize,
    pub lobe_points: Vec<LobePoint>,
    /// Present when the capture was retained for persistence
    pub capture: Option<Capture>,
    pub stop_reason: StopReason,
}

// ============================================================================
// Calibration run
// ============================================================================

/// Lobe points gathered across the cuts of one calibration run.
#[derive(Debug, Clone, Default)]
pub struct CalibrationSession {
    target: usize,
    cuts: usize,
    points: Vec<LobePoint>,
}

impl CalibrationSession {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            cuts: 0,
            points: Vec::new(),
        }
    }

    /// Absorb the points of a finished cut.
    pub fn record_cut(&mut self, report: &SessionReport) {
        self.cuts += 1;
        self.points.extend_from_slice(&report.lobe_points);
        info!(
            cut = self.cuts,
            rpm = report.rpm,
            new_points = report.lobe_points.len(),
            total_points = self.points.len(),
            target = self.target,
            "Cut finished"
        );
    }

    pub fn points(&self) -> &[LobePoint] {
        &self.points
    }

    pub const fn cuts(&self) -> usize {
        self.cuts
    }

    pub fn remaining(&self) -> usize {
        self.target.saturating_sub(self.points.len())
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    pub fn fit(&self, fitter: &LobeFitter) -> Result<LobeModel, FitError> {
        fitter.fit(&self.points)
    }
}
