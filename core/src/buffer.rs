//! FIFO of decoder-rate samples awaiting analysis

use std::collections::VecDeque;

/// Growable sample queue consumed from the front
///
/// The decoder appends resampled audio at the back and discards analysed
/// samples from the front. Analysis windows read a contiguous view.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: VecDeque<f32>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop up to `count` samples from the front, returning how many were dropped
    pub fn consume(&mut self, count: usize) -> usize {
        let count = count.min(self.samples.len());
        self.samples.drain(..count);
        count
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Contiguous view of every buffered sample, oldest first
    pub fn as_slice(&mut self) -> &[f32] {
        self.samples.make_contiguous()
    }
}

impl Extend<f32> for SampleBuffer {
    fn extend<T: IntoIterator<Item = f32>>(&mut self, iter: T) {
        self.samples.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_consume() {
        let mut buffer = SampleBuffer::new();
        buffer.extend([0.1, 0.2, 0.3, 0.4]);
        assert_eq!(buffer.len(), 4);

        assert_eq!(buffer.consume(2), 2);
        assert_eq!(buffer.as_slice(), &[0.3, 0.4]);
    }

    #[test]
    fn test_consume_clamps_to_length() {
        let mut buffer = SampleBuffer::new();
        buffer.extend([1.0, 2.0]);
        assert_eq!(buffer.consume(10), 2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.consume(1), 0);
    }

    #[test]
    fn test_contiguous_after_wraparound() {
        let mut buffer = SampleBuffer::with_capacity(4);
        buffer.extend([1.0, 2.0, 3.0]);
        buffer.consume(2);
        buffer.extend([4.0, 5.0, 6.0]);
        assert_eq!(buffer.as_slice(), &[3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = SampleBuffer::new();
        buffer.extend([0.5; 16]);
        buffer.clear();
        assert_eq!(buffer.len(), 0);
        assert!(buffer.as_slice().is_empty());
    }
}
