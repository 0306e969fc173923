//! One full sampling cycle, run on the deferred worker.
//!
//! Each step degrades rather than aborting: a failed sensor read is replaced
//! by a default value, and a full buffer silently drops the measurement. The
//! buffer lock is only taken for the final append, never during sensor I/O.

use crate::core::buffer::SharedMeasurementBuffer;
use crate::core::calibration::{CycleCounter, SharedCalibrationState};
use crate::core::features::{expand_features, FeatureInputs};
use crate::core::measurement::Measurement;
use crate::core::noise::NoiseSource;
use crate::diagnostics::SharedAcquisitionStats;
use crate::sensor::{PowerMonitor, DEFAULT_ENERGY_J, DEFAULT_TEMPERATURE_C};
use chrono::Utc;
use std::sync::Arc;

/// Counter ticks are nanoseconds; latency is reported in microseconds.
const TICKS_TO_MICROS: f64 = 0.001;

/// What a single capture did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The measurement was appended
    Stored,
    /// The buffer was full; the measurement was discarded
    Dropped,
    /// The agent was stopped when the capture began; nothing was sampled
    Skipped,
}

/// Everything a capture needs, owned by the worker.
pub struct CaptureTask {
    buffer: SharedMeasurementBuffer,
    calibration: SharedCalibrationState,
    clock: Arc<dyn CycleCounter>,
    sensor: PowerMonitor,
    noise: Box<dyn NoiseSource>,
    stats: SharedAcquisitionStats,
}

impl CaptureTask {
    pub fn new(
        buffer: SharedMeasurementBuffer,
        calibration: SharedCalibrationState,
        clock: Arc<dyn CycleCounter>,
        sensor: PowerMonitor,
        noise: Box<dyn NoiseSource>,
        stats: SharedAcquisitionStats,
    ) -> Self {
        Self {
            buffer,
            calibration,
            clock,
            sensor,
            noise,
            stats,
        }
    }

    /// Run one capture cycle.
    pub fn run(&mut self) -> CaptureOutcome {
        if !self.buffer.is_running() {
            self.stats.record_skipped();
            return CaptureOutcome::Skipped;
        }

        let start = self.clock.now();
        let timestamp = Utc::now()
            .timestamp_nanos_opt()
            .map_or(0, |ns| ns.max(0) as u64);

        let temperature = match self.sensor.read_temperature(self.noise.as_mut()) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!("Temperature read failed, using default: {}", e);
                self.stats.record_sensor_fault();
                DEFAULT_TEMPERATURE_C
            }
        };

        let energy = match self.sensor.read_energy() {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("Energy read failed, using default: {}", e);
                self.stats.record_sensor_fault();
                DEFAULT_ENERGY_J
            }
        };

        let cycle_count = self.clock.now();
        let inputs = FeatureInputs {
            cycle_delta: cycle_count.wrapping_sub(self.calibration.last_cycle_count()),
            cycle_count,
            energy,
            temperature,
        };
        let dimensions = expand_features(&inputs, self.noise.as_mut());

        let end = self.clock.now();
        let latency = end.wrapping_sub(start) as f64 * TICKS_TO_MICROS;

        let measurement = Measurement {
            timestamp,
            temperature,
            energy,
            latency,
            dimensions,
        };

        let outcome = if self.buffer.append(measurement) {
            self.stats.record_stored();
            tracing::trace!(
                temperature,
                energy,
                latency,
                cycle_delta = inputs.cycle_delta,
                "Measurement stored"
            );
            CaptureOutcome::Stored
        } else {
            self.stats.record_dropped();
            tracing::trace!("Buffer full, measurement dropped");
            CaptureOutcome::Dropped
        };

        self.calibration.set_last_cycle_count(end);
        outcome
    }
}

impl std::fmt::Debug for CaptureTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureTask")
            .field("buffer", &self.buffer)
            .field("sensor", &self.sensor)
            .finish_non_exhaustive()
    }
}
