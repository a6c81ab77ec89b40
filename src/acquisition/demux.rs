//! Interleaved scan buffers to calibrated samples

use std::time::Instant;
use tracing::{info, warn};

use super::AcquisitionError;
use crate::config::AcquisitionConfig;
use crate::types::Sample;

/// Linear voltage-to-acceleration conversion for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelCalibration {
    /// Volts per m/s²
    pub sensitivity: f64,
    /// Subtracted after scaling (m/s²)
    pub offset: f64,
}

impl ChannelCalibration {
    pub const fn new(sensitivity: f64, offset: f64) -> Self {
        Self { sensitivity, offset }
    }

    pub fn to_accel(&self, volts: f64) -> f64 {
        volts / self.sensitivity - self.offset
    }

    pub fn to_volts(&self, accel: f64) -> f64 {
        (accel + self.offset) * self.sensitivity
    }
}

/// One decoded acquisition batch.
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    pub samples: Vec<Sample>,
    /// Scans in the raw buffer, valid or not
    pub scans: usize,
    /// Sentinel values found across both channels
    pub missed_values: usize,
}

/// De-interleaves `x0, y0, x1, y1, ...` scan buffers.
#[derive(Debug, Clone)]
pub struct Demultiplexer {
    pub x: ChannelCalibration,
    pub y: ChannelCalibration,
    pub sentinel: f64,
    pub batch_seconds: f64,
    pub max_missed_fraction: f64,
}

impl Demultiplexer {
    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self {
            x: ChannelCalibration::new(config.x_sensitivity, config.x_offset),
            y: ChannelCalibration::new(config.y_sensitivity, config.y_offset),
            sentinel: config.sentinel,
            batch_seconds: config.batch_seconds,
            max_missed_fraction: config.max_missed_fraction,
        }
    }

    /// Decode batch number `batch_index`.
    ///
    /// Scans carry no clock, so scan `j` of `n` is stamped
    /// `batch_index * batch_seconds + j * batch_seconds / n`. A scan with a
    /// sentinel on either channel keeps its time slot but yields no sample.
    pub fn decode(&self, raw: &[f64], batch_index: u64) -> Result<DecodedBatch, AcquisitionError> {
        if raw.len() % 2 != 0 {
            return Err(AcquisitionError::Fault(format!(
                "scan buffer of {} values is not a whole number of 2-channel scans",
                raw.len()
            )));
        }

        let scans = raw.len() / 2;
        let missed_values = raw.iter().filter(|&&v| v == self.sentinel).count();
        if scans > 0 && missed_values as f64 > self.max_missed_fraction * raw.len() as f64 {
            return Err(AcquisitionError::Fault(format!(
                "{missed_values} of {} values missed in batch {batch_index}",
                raw.len()
            )));
        }

        let t0 = batch_index as f64 * self.batch_seconds;
        let dt = if scans > 0 { self.batch_seconds / scans as f64 } else { 0.0 };
        let samples = raw
            .chunks_exact(2)
            .enumerate()
            .filter(|(_, scan)| scan[0] != self.sentinel && scan[1] != self.sentinel)
            .map(|(j, scan)| {
                Sample::new(t0 + j as f64 * dt, self.x.to_accel(scan[0]), self.y.to_accel(scan[1]))
            })
            .collect();

        Ok(DecodedBatch {
            samples,
            scans,
            missed_values,
        })
    }

    /// Interleave accelerations back into a raw voltage buffer.
    pub fn encode(&self, accel: &[(f64, f64)]) -> Vec<f64> {
        accel
            .iter()
            .flat_map(|&(ax, ay)| [self.x.to_volts(ax), self.y.to_volts(ay)])
            .collect()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Cumulative scan counters for the end-of-session timing report.
#[derive(Debug, Clone)]
pub struct AcquisitionStats {
    pub batches: u64,
    pub total_scans: u64,
    /// Missed values divided by the channel count
    pub skipped_scans: u64,
    pub nominal_rate_hz: f64,
    started: Instant,
}

impl AcquisitionStats {
    pub fn new(nominal_rate_hz: f64) -> Self {
        Self {
            batches: 0,
            total_scans: 0,
            skipped_scans: 0,
            nominal_rate_hz,
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, batch: &DecodedBatch) {
        self.batches += 1;
        self.total_scans += batch.scans as u64;
        let skipped = (batch.missed_values / 2) as u64;
        self.skipped_scans += skipped;
        if batch.missed_values > 0 {
            warn!(
                batch = self.batches,
                missed = batch.missed_values,
                total_skipped = self.skipped_scans,
                "Missed samples in acquisition batch"
            );
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Scans per wall-clock second since the stream started.
    pub fn effective_scan_rate(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            self.total_scans as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn log_report(&self) {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("ACQUISITION TIMING");
        info!("   Total scans:          {}", self.total_scans);
        info!("   Skipped scans:        {}", self.skipped_scans);
        info!("   Time taken:           {:.3} s", self.elapsed_secs());
        info!("   Nominal scan rate:    {:.1} scans/s", self.nominal_rate_hz);
        info!("   Timed scan rate:      {:.1} scans/s", self.effective_scan_rate());
        info!("   Timed sample rate:    {:.1} samples/s", 2.0 * self.effective_scan_rate());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demux() -> Demultiplexer {
        Demultiplexer::from_config(&AcquisitionConfig::default())
    }

    #[test]
    fn test_calibration_matches_sensor_sheet() {
        let cal = ChannelCalibration::new(0.001_156, -290.337_933_013_119);
        // 0 V reads as the negated offset
        assert!((cal.to_accel(0.0) - 290.337_933_013_119).abs() < 1e-9);
        assert!((cal.to_accel(cal.to_volts(12.5)) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_stamps_and_converts() {
        let d = demux();
        let raw = d.encode(&[(1.0, -1.0), (2.0, -2.0), (3.0, -3.0), (4.0, -4.0)]);
        let batch = d.decode(&raw, 3).unwrap();
        assert_eq!(batch.scans, 4);
        assert_eq!(batch.samples.len(), 4);
        assert!((batch.samples[0].t - 1.5).abs() < 1e-12);
        assert!((batch.samples[2].t - 1.75).abs() < 1e-12);
        assert!((batch.samples[3].ax - 4.0).abs() < 1e-9);
        assert!((batch.samples[3].ay + 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_sentinel_scans_are_counted_and_excluded() {
        let d = demux();
        let mut raw = d.encode(&[(1.0, 1.0); 10]);
        raw[4] = -9999.0;
        raw[9] = -9999.0;
        let batch = d.decode(&raw, 0).unwrap();
        assert_eq!(batch.missed_values, 2);
        assert_eq!(batch.samples.len(), 8);
        assert!(batch.samples.windows(2).all(|w| w[1].t > w[0].t));

        let mut stats = AcquisitionStats::new(8000.0);
        stats.record(&batch);
        assert_eq!(stats.total_scans, 10);
        assert_eq!(stats.skipped_scans, 1);
    }

    #[test]
    fn test_faults() {
        let d = demux();
        assert!(matches!(d.decode(&[0.1, 0.2, 0.3], 0), Err(AcquisitionError::Fault(_))));
        assert!(matches!(d.decode(&[-9999.0; 8], 0), Err(AcquisitionError::Fault(_))));
        assert!(d.decode(&[], 0).unwrap().samples.is_empty());
    }
}
