//! Lock-free acquisition counters.
//!
//! Every counter is a relaxed atomic so it can be bumped from the timer tick
//! and the capture worker without touching the buffer lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current agent session.
#[derive(Debug)]
pub struct AcquisitionStats {
    /// Timer expiries while armed
    ticks: AtomicU64,
    /// Capture requests handed to the worker
    enqueued: AtomicU64,
    /// Ticks absorbed because a request was already outstanding
    coalesced: AtomicU64,
    /// Measurements appended to the buffer
    stored: AtomicU64,
    /// Measurements dropped because the buffer was full
    dropped: AtomicU64,
    /// Captures that found the agent stopped and recorded nothing
    skipped: AtomicU64,
    /// Sensor reads replaced by a default value
    sensor_faults: AtomicU64,
    /// Non-empty drains
    drains: AtomicU64,
    /// Measurements handed to consumers
    records_drained: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
}

impl AcquisitionStats {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            enqueued: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            stored: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            sensor_faults: AtomicU64::new(0),
            drains: AtomicU64::new(0),
            records_drained: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stored(&self) {
        self.stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sensor_fault(&self) {
        self.sensor_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a drain that returned `count` measurements.
    pub fn record_drain(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.drains.fetch_add(1, Ordering::Relaxed);
        self.records_drained
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            sensor_faults: self.sensor_faults.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
            records_drained: self.records_drained.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Acquisition Statistics:\n\
             - Timer ticks: {}\n\
             - Captures enqueued: {}\n\
             - Ticks coalesced: {}\n\
             - Measurements stored: {}\n\
             - Measurements dropped (buffer full): {}\n\
             - Captures skipped (stopped): {}\n\
             - Sensor faults: {}\n\
             - Drains: {} ({} measurements)\n\
             - Session duration: {} seconds",
            stats.ticks,
            stats.enqueued,
            stats.coalesced,
            stats.stored,
            stats.dropped,
            stats.skipped,
            stats.sensor_faults,
            stats.drains,
            stats.records_drained,
            stats.session_duration_secs
        )
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.ticks,
            &self.enqueued,
            &self.coalesced,
            &self.stored,
            &self.dropped,
            &self.skipped,
            &self.sensor_faults,
            &self.drains,
            &self.records_drained,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for AcquisitionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of acquisition statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub enqueued: u64,
    pub coalesced: u64,
    pub stored: u64,
    pub dropped: u64,
    pub skipped: u64,
    pub sensor_faults: u64,
    pub drains: u64,
    pub records_drained: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared statistics.
pub type SharedAcquisitionStats = Arc<AcquisitionStats>;

/// Create a new shared statistics block.
pub fn create_shared_stats() -> SharedAcquisitionStats {
    Arc::new(AcquisitionStats::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counting() {
        let stats = AcquisitionStats::new();

        stats.record_tick();
        stats.record_tick();
        stats.record_enqueued();
        stats.record_coalesced();
        stats.record_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.ticks, 2);
        assert_eq!(snapshot.enqueued, 1);
        assert_eq!(snapshot.coalesced, 1);
        assert_eq!(snapshot.dropped, 1);
    }

    #[test]
    fn test_empty_drain_not_counted() {
        let stats = AcquisitionStats::new();
        stats.record_drain(0);
        stats.record_drain(12);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.drains, 1);
        assert_eq!(snapshot.records_drained, 12);
    }

    #[test]
    fn test_stats_reset() {
        let stats = AcquisitionStats::new();
        stats.record_stored();
        stats.record_sensor_fault();
        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.stored, 0);
        assert_eq!(snapshot.sensor_faults, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = AcquisitionStats::new().summary();
        assert!(summary.contains("Timer ticks"));
        assert!(summary.contains("buffer full"));
        assert!(summary.contains("Sensor faults"));
    }
}
