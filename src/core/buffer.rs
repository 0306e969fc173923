//! Bounded measurement buffer with destructive drain-on-read.
//!
//! Captures append until the buffer is full; after that new measurements are
//! dropped (never overwritten, never queued) until a consumer drains. A drain
//! returns everything captured so far, in capture order, and empties the
//! buffer in the same critical section.

use crate::core::measurement::Measurement;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default number of measurements held between drains.
pub const DEFAULT_CAPACITY: usize = 1000;

struct BufferState {
    samples: Vec<Measurement>,
}

/// Mutex-guarded store shared by the capture worker and the consumer.
///
/// The lock is never held across sensor I/O; both critical sections are
/// bounded (one push, or one move of at most `capacity` records).
pub struct MeasurementBuffer {
    state: Mutex<BufferState>,
    capacity: usize,
    /// Lifecycle flag. Written under the lock, read lock-free by the timer tick.
    running: AtomicBool,
}

impl MeasurementBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BufferState {
                samples: Vec::with_capacity(capacity),
            }),
            capacity,
            running: AtomicBool::new(false),
        }
    }

    /// Store a measurement. Returns `false` if the buffer was full and the
    /// measurement was dropped.
    pub fn append(&self, measurement: Measurement) -> bool {
        let mut state = self.state.lock();
        if state.samples.len() >= self.capacity {
            return false;
        }
        state.samples.push(measurement);
        true
    }

    /// Take every stored measurement, oldest first, and reset the occupancy
    /// to zero.
    pub fn drain_all(&self) -> Vec<Measurement> {
        let mut state = self.state.lock();
        if state.samples.is_empty() {
            return Vec::new();
        }
        state.samples.drain(..).collect()
    }

    /// Current occupancy.
    pub fn len(&self) -> usize {
        self.state.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flip the lifecycle flag. Returns the previous value.
    pub fn set_running(&self, running: bool) -> bool {
        let _state = self.state.lock();
        self.running.swap(running, Ordering::SeqCst)
    }
}

impl Default for MeasurementBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MeasurementBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Thread-safe shared measurement buffer.
pub type SharedMeasurementBuffer = Arc<MeasurementBuffer>;
