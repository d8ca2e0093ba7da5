//! Sample queue between the feed thread and the device callback
//!
//! The feed thread pushes decoded chunks, the device callback pulls
//! batches to play. Storage is allocated once at the requested capacity
//! and never grows, so a stalled device applies backpressure to the feed
//! thread instead of buffering the whole track.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Largest accepted capacity, in samples (64 MB)
const MAX_CAPACITY: usize = 64 * 1024 * 1024 / std::mem::size_of::<i16>();

/// Error type for ring buffer operations
#[derive(Debug, Clone)]
pub struct RingBufferError(pub String);

impl std::fmt::Display for RingBufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RingBufferError {}

impl From<RingBufferError> for crate::RizumuError {
    fn from(err: RingBufferError) -> Self {
        crate::RizumuError::AudioDevice(err.0)
    }
}

/// Bounded queue of interleaved signed 16-bit samples
#[derive(Debug)]
pub struct RingBuffer {
    samples: Mutex<VecDeque<i16>>,
    capacity: usize,
}

impl RingBuffer {
    /// Create a buffer holding up to `capacity` samples.
    ///
    /// # Errors
    ///
    /// Fails if `capacity` is 0 or larger than 64 MB of samples.
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError(
                "Ring buffer capacity must be greater than 0".into(),
            ));
        }
        if capacity > MAX_CAPACITY {
            return Err(RingBufferError(format!(
                "Ring buffer capacity {capacity} exceeds maximum safe size {MAX_CAPACITY}"
            )));
        }
        Ok(RingBuffer {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    /// Storage capacity in samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples waiting to be read
    pub fn available_read(&self) -> usize {
        self.samples.lock().len()
    }

    /// Samples that can be written right now
    pub fn available_write(&self) -> usize {
        self.capacity - self.available_read()
    }

    /// Queue as many of `samples` as fit. Returns the number queued.
    pub fn write(&self, samples: &[i16]) -> usize {
        let mut queue = self.samples.lock();
        let count = samples.len().min(self.capacity - queue.len());
        queue.extend(&samples[..count]);
        count
    }

    /// Move up to `dest.len()` samples into `dest`. Returns the number moved.
    pub fn read(&self, dest: &mut [i16]) -> usize {
        let mut queue = self.samples.lock();
        let count = dest.len().min(queue.len());
        for (slot, sample) in dest.iter_mut().zip(queue.drain(..count)) {
            *slot = sample;
        }
        count
    }

    /// Discard everything queued
    pub fn flush(&self) {
        self.samples.lock().clear();
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }
}
