//! Diagnostics for the measurement agent.
//!
//! Overflow drops, coalesced ticks and sensor faults are never surfaced to
//! callers as errors. They are counted here instead, and summarised for
//! operators.

pub mod stats;
pub mod summary;

// Re-export commonly used types
pub use stats::{create_shared_stats, AcquisitionStats, SharedAcquisitionStats, StatsSnapshot};
pub use summary::BatchSummary;
