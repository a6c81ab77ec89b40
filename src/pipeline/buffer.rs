//! Append-only sample buffer with absolute indexing and bounded retention

use tracing::warn;

use crate::types::{Sample, Window};

/// Time-ordered samples addressed by absolute index.
///
/// `origin` is the absolute index of the oldest retained sample. Releasing
/// old samples moves the origin forward but never renumbers what remains, so
/// window indices stay valid for the whole session.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: Vec<Sample>,
    origin: usize,
    rejected: usize,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let mut buffer = Self::new();
        buffer.extend(&samples);
        buffer
    }

    /// Append a batch, dropping any sample that does not advance time.
    ///
    /// Returns the number of samples appended.
    pub fn extend(&mut self, batch: &[Sample]) -> usize {
        let mut appended = 0;
        let mut dropped = 0;
        for sample in batch {
            let advances = self.samples.last().map_or(true, |last| sample.t > last.t);
            if advances && sample.t.is_finite() {
                self.samples.push(*sample);
                appended += 1;
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(dropped, "Dropped non-monotonic samples");
            self.rejected += dropped;
        }
        appended
    }

    /// Absolute index one past the newest sample.
    pub fn len(&self) -> usize {
        self.origin + self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn origin(&self) -> usize {
        self.origin
    }

    pub fn retained(&self) -> usize {
        self.samples.len()
    }

    pub const fn rejected(&self) -> usize {
        self.rejected
    }

    /// Samples covered by `window`, if all of them are still retained.
    pub fn window(&self, window: Window) -> Option<&[Sample]> {
        if window.start < self.origin || window.end > self.len() {
            return None;
        }
        self.samples.get(window.start - self.origin..window.end - self.origin)
    }

    /// Release every sample with absolute index below `index`.
    pub fn discard_before(&mut self, index: usize) {
        let count = index.saturating_sub(self.origin).min(self.samples.len());
        if count > 0 {
            self.samples.drain(..count);
            self.origin += count;
        }
    }

    pub fn last_time(&self) -> Option<f64> {
        self.samples.last().map(|s| s.t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, n: usize) -> Vec<Sample> {
        (start..start + n)
            .map(|i| Sample::new(i as f64 * 0.001, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn test_extend_rejects_non_monotonic() {
        let mut buffer = SampleBuffer::new();
        assert_eq!(buffer.extend(&ramp(0, 10)), 10);
        assert_eq!(buffer.extend(&[Sample::new(0.005, 1.0, 1.0)]), 0);
        assert_eq!(buffer.rejected(), 1);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_absolute_indices_survive_discard() {
        let mut buffer = SampleBuffer::from_samples(ramp(0, 100));
        buffer.discard_before(40);
        assert_eq!(buffer.origin(), 40);
        assert_eq!(buffer.retained(), 60);
        assert_eq!(buffer.len(), 100);

        let window = buffer.window(Window::new(50, 60)).unwrap();
        assert_eq!(window.len(), 10);
        assert!((window[0].t - 0.050).abs() < 1e-12);

        assert!(buffer.window(Window::new(30, 60)).is_none());
        assert!(buffer.window(Window::new(90, 101)).is_none());
    }

    #[test]
    fn test_discard_is_clamped() {
        let mut buffer = SampleBuffer::from_samples(ramp(0, 5));
        buffer.discard_before(2);
        buffer.discard_before(1);
        assert_eq!(buffer.origin(), 2);
        buffer.discard_before(50);
        assert_eq!(buffer.retained(), 0);
        assert_eq!(buffer.len(), 5);
    }
}
