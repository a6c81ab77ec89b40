//! Sample source abstraction for acceleration ingestion.
//!
//! The processing loop pulls bounded batches from a [`SampleSource`]:
//! a live acquisition device ([`DaqSource`](crate::acquisition::DaqSource))
//! or a recorded capture replayed batch by batch ([`CaptureSource`]).

use async_trait::async_trait;

use crate::acquisition::AcquisitionError;
use crate::types::Sample;

/// Events produced by a sample source.
#[derive(Debug)]
pub enum BatchEvent {
    /// One time-ordered batch of samples.
    Batch(Vec<Sample>),
    /// No more data (end of file, or the device stream was stopped).
    Eof,
}

/// Where acceleration batches come from.
///
/// The processing loop calls [`next_batch`](SampleSource::next_batch) in a
/// `select!` with cancellation, so implementations may await freely.
#[async_trait]
pub trait SampleSource: Send + 'static {
    /// Read the next batch.
    ///
    /// `Err` is a per-batch fault; the loop logs it and keeps reading.
    async fn next_batch(&mut self) -> Result<BatchEvent, AcquisitionError>;

    /// Human-readable name for logging (e.g. "capture", "DAQ").
    fn source_name(&self) -> &str;

    /// Log end-of-session diagnostics, if the source keeps any.
    fn log_report(&self) {}
}

// ============================================================================
// Capture Source (file replay)
// ============================================================================

/// Replays recorded samples in fixed-size batches with optional pacing.
pub struct CaptureSource {
    samples: Vec<Sample>,
    cursor: usize,
    batch_len: usize,
    delay_ms: u64,
}

impl CaptureSource {
    pub fn new(samples: Vec<Sample>, batch_len: usize, delay_ms: u64) -> Self {
        Self {
            samples,
            cursor: 0,
            batch_len: batch_len.max(1),
            delay_ms,
        }
    }
}

#[async_trait]
impl SampleSource for CaptureSource {
    async fn next_batch(&mut self) -> Result<BatchEvent, AcquisitionError> {
        if self.cursor >= self.samples.len() {
            return Ok(BatchEvent::Eof);
        }
        // No delay before the first batch
        if self.cursor > 0 && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        let end = (self.cursor + self.batch_len).min(self.samples.len());
        let batch = self.samples[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(BatchEvent::Batch(batch))
    }

    fn source_name(&self) -> &str {
        "capture"
    }
}
