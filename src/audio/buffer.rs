//! Bounded stereo sample buffer shared between the audio callback and the
//! spectral estimator.
//!
//! The producer runs on the real-time audio thread: pushes only touch
//! pre-allocated storage and hold the lock for the decode-and-push. When the
//! buffer is full the oldest frames are dropped and counted. The consumer
//! removes whole batches; the length check and the removal happen under one
//! lock, so a batch is never short.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// One stereo sample pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFrame {
    pub left: i32,
    pub right: i32,
}

impl AudioFrame {
    pub fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    /// Downmix by summing both channels
    pub fn mono(&self) -> f64 {
        self.left as f64 + self.right as f64
    }
}

struct Shared {
    frames: Mutex<VecDeque<AudioFrame>>,
    capacity: usize,
    dropped: AtomicUsize,
}

/// Cloneable handle to the shared FIFO of audio frames
#[derive(Clone)]
pub struct SampleBuffer {
    shared: Arc<Shared>,
}

impl SampleBuffer {
    /// Create a buffer holding at most `capacity` frames (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                frames: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                dropped: AtomicUsize::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames discarded by the drop-oldest overflow policy so far
    pub fn dropped_frames(&self) -> usize {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Append one frame per (left, right) pair; extra samples on the longer
    /// channel are ignored.
    pub fn push_planar<L, R>(&self, left: L, right: R)
    where
        L: IntoIterator<Item = i32>,
        R: IntoIterator<Item = i32>,
    {
        let mut frames = self.lock();
        let mut dropped = 0;
        for (l, r) in left.into_iter().zip(right) {
            dropped += self.push_locked(&mut frames, AudioFrame::new(l, r));
        }
        drop(frames);
        if dropped > 0 {
            self.shared.dropped.fetch_add(dropped, Ordering::Relaxed);
        }
    }

    /// Append interleaved `[l, r, l, r, ...]` samples; a trailing odd sample is ignored.
    pub fn push_interleaved<I>(&self, samples: I)
    where
        I: IntoIterator<Item = i32>,
    {
        let mut frames = self.lock();
        let mut dropped = 0;
        let mut samples = samples.into_iter();
        while let (Some(l), Some(r)) = (samples.next(), samples.next()) {
            dropped += self.push_locked(&mut frames, AudioFrame::new(l, r));
        }
        drop(frames);
        if dropped > 0 {
            self.shared.dropped.fetch_add(dropped, Ordering::Relaxed);
        }
    }

    fn push_locked(&self, frames: &mut VecDeque<AudioFrame>, frame: AudioFrame) -> usize {
        let mut dropped = 0;
        if frames.len() >= self.shared.capacity {
            frames.pop_front();
            dropped = 1;
        }
        frames.push_back(frame);
        dropped
    }

    /// Remove exactly `count` oldest frames, or nothing if fewer are buffered
    pub fn pop_batch(&self, count: usize) -> Option<Vec<AudioFrame>> {
        let mut frames = self.lock();
        if frames.len() < count {
            return None;
        }
        Some(frames.drain(..count).collect())
    }

    // A panic while holding the lock cannot leave the deque inconsistent,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<AudioFrame>> {
        self.shared
            .frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Decode a raw port buffer as little-endian 32-bit signed samples
pub fn decode_le_i32(bytes: &[u8]) -> impl Iterator<Item = i32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Decode a raw port buffer as little-endian 32-bit float samples, scaled to full-scale i32
pub fn decode_le_f32(bytes: &[u8]) -> impl Iterator<Item = i32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|b| f32_to_i32(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
}

/// Decode a raw port buffer as little-endian 16-bit samples, widened to i32
pub fn decode_le_i16(bytes: &[u8]) -> impl Iterator<Item = i32> + '_ {
    bytes
        .chunks_exact(2)
        .map(|b| (i16::from_le_bytes([b[0], b[1]]) as i32) << 16)
}

fn f32_to_i32(sample: f32) -> i32 {
    // `as` saturates; NaN becomes 0
    (sample.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let buffer = SampleBuffer::with_capacity(16);
        buffer.push_planar([1, 2, 3], [10, 20, 30]);
        buffer.push_interleaved([4, 40]);

        let batch = buffer.pop_batch(2).unwrap();
        assert_eq!(batch, vec![AudioFrame::new(1, 10), AudioFrame::new(2, 20)]);
        let batch = buffer.pop_batch(2).unwrap();
        assert_eq!(batch, vec![AudioFrame::new(3, 30), AudioFrame::new(4, 40)]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one_frame() {
        let buffer = SampleBuffer::with_capacity(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push_planar([1, 2], [1, 2]);
        assert_eq!(buffer.pop_batch(1).unwrap(), vec![AudioFrame::new(2, 2)]);
    }

    #[test]
    fn test_short_batch_leaves_buffer_untouched() {
        let buffer = SampleBuffer::with_capacity(16);
        buffer.push_planar([1, 2], [1, 2]);
        assert!(buffer.pop_batch(3).is_none());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let buffer = SampleBuffer::with_capacity(3);
        buffer.push_planar([1, 2, 3, 4, 5], [0; 5]);

        assert_eq!(buffer.capacity(), 3);
        assert_eq!(buffer.len(), buffer.capacity());
        assert_eq!(buffer.dropped_frames(), 2);
        let lefts: Vec<i32> = buffer.pop_batch(3).unwrap().iter().map(|f| f.left).collect();
        assert_eq!(lefts, vec![3, 4, 5]);
    }

    #[test]
    fn test_unequal_channels_zip_to_shorter() {
        let buffer = SampleBuffer::with_capacity(8);
        buffer.push_planar([1, 2, 3], [7]);
        buffer.push_interleaved([5, 6, 9]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_decode_little_endian() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&(-2i32).to_le_bytes());
        bytes.push(0xff); // partial trailing sample
        assert_eq!(decode_le_i32(&bytes).collect::<Vec<_>>(), vec![1, -2]);
    }

    #[test]
    fn test_decode_float_full_scale() {
        let mut bytes = Vec::new();
        for s in [1.0f32, -1.0, 0.0, 2.0] {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let decoded: Vec<i32> = decode_le_f32(&bytes).collect();
        assert_eq!(decoded[0], i32::MAX);
        assert_eq!(decoded[1], -i32::MAX);
        assert_eq!(decoded[2], 0);
        assert_eq!(decoded[3], i32::MAX);
    }

    #[test]
    fn test_mono_downmix_sums() {
        assert_eq!(AudioFrame::new(i32::MAX, i32::MAX).mono(), 2.0 * i32::MAX as f64);
    }
}
