//! Data-acquisition device stream

use async_trait::async_trait;
use tokio::time::{Duration, Instant};

use super::{AcquisitionError, AcquisitionStats, Demultiplexer, SyntheticCut};
use crate::config::AcquisitionConfig;
use crate::pipeline::{BatchEvent, SampleSource};

/// A device delivering interleaved two-channel scan buffers.
#[async_trait]
pub trait ScanStream: Send + 'static {
    /// Next raw buffer, or `None` once the stream has stopped.
    async fn read_scans(&mut self) -> Result<Option<Vec<f64>>, AcquisitionError>;

    fn device_name(&self) -> &str;
}

// ============================================================================
// Simulated device
// ============================================================================

/// Streams a [`SyntheticCut`] as raw voltages, paced like real hardware.
pub struct SimulatedDaq {
    cut: SyntheticCut,
    demux: Demultiplexer,
    sample_rate_hz: f64,
    scans_per_batch: usize,
    next_scan: u64,
    max_scans: Option<u64>,
    /// Every n-th scan reads as the sentinel on the X channel
    drop_every: Option<u64>,
    sentinel: f64,
    realtime: bool,
    next_due: Option<Instant>,
}

impl SimulatedDaq {
    pub fn new(cut: SyntheticCut, config: &AcquisitionConfig) -> Self {
        Self {
            cut,
            demux: Demultiplexer::from_config(config),
            sample_rate_hz: config.sample_rate_hz,
            scans_per_batch: config.scans_per_batch().max(1),
            next_scan: 0,
            max_scans: None,
            drop_every: None,
            sentinel: config.sentinel,
            realtime: false,
            next_due: None,
        }
    }

    /// Stop after `seconds` of scans.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.max_scans = Some((seconds * self.sample_rate_hz).round() as u64);
        self
    }

    /// Pace batches at the configured batch period.
    pub fn realtime(mut self, enabled: bool) -> Self {
        self.realtime = enabled;
        self
    }

    pub fn with_missed_scans(mut self, every: u64) -> Self {
        self.drop_every = (every > 0).then_some(every);
        self
    }
}

#[async_trait]
impl ScanStream for SimulatedDaq {
    async fn read_scans(&mut self) -> Result<Option<Vec<f64>>, AcquisitionError> {
        let remaining = self.max_scans.map_or(u64::MAX, |max| max.saturating_sub(self.next_scan));
        if remaining == 0 {
            return Ok(None);
        }
        let count = self.scans_per_batch.min(remaining.try_into().unwrap_or(usize::MAX));

        if self.realtime {
            let period = Duration::from_secs_f64(self.scans_per_batch as f64 / self.sample_rate_hz);
            let due = self.next_due.unwrap_or_else(|| Instant::now() + period);
            tokio::time::sleep_until(due).await;
            self.next_due = Some(due + period);
        }

        let accel = self.cut.generate(self.next_scan, count, self.sample_rate_hz);
        let mut raw = self.demux.encode(&accel);
        if let Some(every) = self.drop_every {
            for (j, scan) in raw.chunks_exact_mut(2).enumerate() {
                if (self.next_scan + j as u64) % every == every - 1 {
                    scan[0] = self.sentinel;
                }
            }
        }
        self.next_scan += count as u64;
        Ok(Some(raw))
    }

    fn device_name(&self) -> &str {
        "simulated-daq"
    }
}

// ============================================================================
// Device-backed sample source
// ============================================================================

/// Demultiplexes a [`ScanStream`] into sample batches and keeps scan statistics.
pub struct DaqSource<S: ScanStream> {
    stream: S,
    demux: Demultiplexer,
    stats: AcquisitionStats,
    batch_index: u64,
}

impl<S: ScanStream> DaqSource<S> {
    pub fn new(stream: S, config: &AcquisitionConfig) -> Self {
        Self {
            stream,
            demux: Demultiplexer::from_config(config),
            stats: AcquisitionStats::new(config.sample_rate_hz),
            batch_index: 0,
        }
    }

    pub const fn stats(&self) -> &AcquisitionStats {
        &self.stats
    }
}

#[async_trait]
impl<S: ScanStream> SampleSource for DaqSource<S> {
    async fn next_batch(&mut self) -> Result<BatchEvent, AcquisitionError> {
        let Some(raw) = self.stream.read_scans().await? else {
            return Ok(BatchEvent::Eof);
        };
        let index = self.batch_index;
        self.batch_index += 1;
        let decoded = self.demux.decode(&raw, index)?;
        self.stats.record(&decoded);
        Ok(BatchEvent::Batch(decoded.samples))
    }

    fn source_name(&self) -> &str {
        self.stream.device_name()
    }

    fn log_report(&self) {
        self.stats.log_report();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_daq_round_trips_through_demux() {
        let config = AcquisitionConfig::default();
        let daq = SimulatedDaq::new(SyntheticCut::new(3000.0, 0.0, None, 1), &config).with_duration(1.2);
        let mut source = DaqSource::new(daq, &config);

        let mut total = 0;
        let mut last_t = -1.0;
        while let BatchEvent::Batch(batch) = source.next_batch().await.unwrap() {
            assert!(batch.first().map_or(true, |s| s.t > last_t));
            last_t = batch.last().map_or(last_t, |s| s.t);
            total += batch.len();
        }
        assert_eq!(total, 9600);
        assert_eq!(source.stats().batches, 3);
        assert_eq!(source.stats().skipped_scans, 0);
    }

    #[tokio::test]
    async fn test_missed_scans_are_excluded() {
        let config = AcquisitionConfig::default();
        let daq = SimulatedDaq::new(SyntheticCut::stable(3000.0, 1), &config)
            .with_duration(0.5)
            .with_missed_scans(100);
        let mut source = DaqSource::new(daq, &config);
        let BatchEvent::Batch(batch) = source.next_batch().await.unwrap() else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), 3960);
        assert_eq!(source.stats().skipped_scans, 20);
    }
}
