//! Core functionality for the measurement agent.
//!
//! This module contains:
//! - The measurement record and its binary layout
//! - Feature expansion from raw signals
//! - The bounded measurement buffer
//! - Cycle counters and calibration state
//! - The capture task run by the deferred worker

pub mod buffer;
pub mod calibration;
pub mod capture;
pub mod features;
pub mod measurement;
pub mod noise;

// Re-export commonly used types
pub use buffer::{MeasurementBuffer, SharedMeasurementBuffer, DEFAULT_CAPACITY};
pub use calibration::{
    CalibrationState, CycleCounter, ManualCycles, MonotonicCycles, SharedCalibrationState,
};
pub use capture::{CaptureOutcome, CaptureTask};
pub use features::{expand_features, DerivedCounters, FeatureInputs};
pub use measurement::{
    decode_records, encode_records, Measurement, RecordError, DIMENSIONS, RECORD_SIZE,
};
pub use noise::{ChaChaNoise, NoiseSource, SequenceNoise};
