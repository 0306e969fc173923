//! Cycle counters and the shared calibration state.
//!
//! The calibration state is written by two contexts: the capture worker
//! (per-sample reference) and the pulse synchronizer (reference taken on each
//! external edge). Both fields are plain atomics so neither writer can block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A monotonically increasing counter with nanosecond ticks.
pub trait CycleCounter: Send + Sync {
    fn now(&self) -> u64;
}

/// Nanoseconds elapsed since the counter was created.
#[derive(Debug, Clone)]
pub struct MonotonicCycles {
    origin: Instant,
}

impl MonotonicCycles {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicCycles {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleCounter for MonotonicCycles {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// A counter that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualCycles {
    value: AtomicU64,
}

impl ManualCycles {
    pub fn new(start: u64) -> Self {
        Self {
            value: AtomicU64::new(start),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::SeqCst);
    }

    pub fn advance(&self, ticks: u64) {
        self.value.fetch_add(ticks, Ordering::SeqCst);
    }
}

impl CycleCounter for ManualCycles {
    fn now(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

/// Shared cycle-counter references.
#[derive(Debug, Default)]
pub struct CalibrationState {
    /// Counter value at the end of the previous capture
    last_cycle_count: AtomicU64,
    /// Counter value at the most recent pulse edge
    pulse_cycle_count: AtomicU64,
    /// Number of pulse edges seen
    pulses: AtomicU64,
}

impl CalibrationState {
    /// Create a state whose first cycle delta is measured from `cycle_count`.
    pub fn new(cycle_count: u64) -> Self {
        Self {
            last_cycle_count: AtomicU64::new(cycle_count),
            pulse_cycle_count: AtomicU64::new(0),
            pulses: AtomicU64::new(0),
        }
    }

    pub fn last_cycle_count(&self) -> u64 {
        self.last_cycle_count.load(Ordering::Acquire)
    }

    pub fn set_last_cycle_count(&self, cycle_count: u64) {
        self.last_cycle_count.store(cycle_count, Ordering::Release);
    }

    /// Record a pulse edge observed at `cycle_count`.
    pub fn record_pulse(&self, cycle_count: u64) {
        self.pulse_cycle_count.store(cycle_count, Ordering::Release);
        self.pulses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pulse_cycle_count(&self) -> u64 {
        self.pulse_cycle_count.load(Ordering::Acquire)
    }

    pub fn pulse_count(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }

    /// Ticks between the latest pulse and `cycle_count`, or `None` before the
    /// first pulse.
    pub fn drift_since_pulse(&self, cycle_count: u64) -> Option<u64> {
        if self.pulse_count() == 0 {
            return None;
        }
        Some(cycle_count.saturating_sub(self.pulse_cycle_count()))
    }
}

/// Thread-safe shared calibration state.
pub type SharedCalibrationState = Arc<CalibrationState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_cycles() {
        let clock = ManualCycles::new(10);
        assert_eq!(clock.now(), 10);
        clock.advance(5);
        assert_eq!(clock.now(), 15);
        clock.set(100);
        assert_eq!(clock.now(), 100);
    }

    #[test]
    fn test_monotonic_cycles_never_decrease() {
        let clock = MonotonicCycles::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_drift_requires_a_pulse() {
        let state = CalibrationState::new(0);
        assert_eq!(state.drift_since_pulse(500), None);

        state.record_pulse(200);
        assert_eq!(state.pulse_count(), 1);
        assert_eq!(state.drift_since_pulse(500), Some(300));
    }

    #[test]
    fn test_last_cycle_count() {
        let state = CalibrationState::new(42);
        assert_eq!(state.last_cycle_count(), 42);
        state.set_last_cycle_count(77);
        assert_eq!(state.last_cycle_count(), 77);
    }
}
