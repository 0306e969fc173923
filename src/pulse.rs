//! Pulse-per-second synchronization.
//!
//! An external edge (a PPS line on real hardware) refreshes the reference
//! cycle count in [`CalibrationState`]. The handler is a single atomic store:
//! it never blocks and never touches the measurement buffer.
//!
//! [`CalibrationState`]: crate::core::calibration::CalibrationState

use crate::core::calibration::{CycleCounter, SharedCalibrationState};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Callback invoked on every rising edge. Carries no payload.
pub type EdgeHandler = Arc<dyn Fn() + Send + Sync>;

/// Default interval of the simulated pulse line.
pub const DEFAULT_PULSE_INTERVAL: Duration = Duration::from_secs(1);

/// An edge-event source.
pub trait PulseLine: Send {
    /// Start delivering edges to `handler`.
    fn attach(&mut self, handler: EdgeHandler) -> Result<(), PulseError>;

    /// Stop delivering edges. Must be safe to call when not attached.
    fn detach(&mut self);
}

/// Records the cycle count on each edge.
#[derive(Clone)]
pub struct PulseSynchronizer {
    calibration: SharedCalibrationState,
    clock: Arc<dyn CycleCounter>,
}

impl PulseSynchronizer {
    pub fn new(calibration: SharedCalibrationState, clock: Arc<dyn CycleCounter>) -> Self {
        Self { calibration, clock }
    }

    /// Edge handler body.
    pub fn on_edge(&self) {
        self.calibration.record_pulse(self.clock.now());
    }

    /// Wrap this synchronizer as a callback for a [`PulseLine`].
    pub fn handler(&self) -> EdgeHandler {
        let sync = self.clone();
        Arc::new(move || sync.on_edge())
    }
}

impl std::fmt::Debug for PulseSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseSynchronizer")
            .field("calibration", &self.calibration)
            .finish_non_exhaustive()
    }
}

/// A pulse line driven by a background thread at a fixed interval.
pub struct SimulatedPulseLine {
    interval: Duration,
    stop: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SimulatedPulseLine {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stop: None,
            thread_handle: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Default for SimulatedPulseLine {
    fn default() -> Self {
        Self::new(DEFAULT_PULSE_INTERVAL)
    }
}

impl PulseLine for SimulatedPulseLine {
    fn attach(&mut self, handler: EdgeHandler) -> Result<(), PulseError> {
        if self.is_attached() {
            return Err(PulseError::AlreadyAttached);
        }

        let (stop, stop_rx) = bounded::<()>(1);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("pulse-line".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => handler(),
                    _ => break,
                }
            })
            .map_err(|e| PulseError::Unavailable(e.to_string()))?;

        self.stop = Some(stop);
        self.thread_handle = Some(handle);
        Ok(())
    }

    fn detach(&mut self) {
        self.stop.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimulatedPulseLine {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Errors that can occur when claiming the pulse line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PulseError {
    AlreadyAttached,
    Unavailable(String),
}

impl std::fmt::Display for PulseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PulseError::AlreadyAttached => write!(f, "Pulse line is already attached"),
            PulseError::Unavailable(e) => write!(f, "Pulse line unavailable: {e}"),
        }
    }
}

impl std::error::Error for PulseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calibration::{CalibrationState, ManualCycles};

    #[test]
    fn test_edge_records_cycle_count() {
        let calibration = Arc::new(CalibrationState::new(0));
        let clock = Arc::new(ManualCycles::new(0));
        let sync = PulseSynchronizer::new(calibration.clone(), clock.clone());

        clock.set(1_000_000_000);
        sync.on_edge();
        clock.set(2_000_000_000);
        (sync.handler())();

        assert_eq!(calibration.pulse_count(), 2);
        assert_eq!(calibration.pulse_cycle_count(), 2_000_000_000);
    }

    #[test]
    fn test_simulated_line_delivers_edges() {
        let calibration = Arc::new(CalibrationState::new(0));
        let sync = PulseSynchronizer::new(calibration.clone(), Arc::new(ManualCycles::new(7)));
        let mut line = SimulatedPulseLine::new(Duration::from_millis(1));

        line.attach(sync.handler()).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while calibration.pulse_count() == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        line.detach();

        assert!(calibration.pulse_count() >= 1);
        assert_eq!(calibration.pulse_cycle_count(), 7);
    }

    #[test]
    fn test_double_attach_rejected() {
        let sync = PulseSynchronizer::new(
            Arc::new(CalibrationState::new(0)),
            Arc::new(ManualCycles::new(0)),
        );
        let mut line = SimulatedPulseLine::new(Duration::from_secs(60));

        line.attach(sync.handler()).unwrap();
        assert_eq!(line.attach(sync.handler()), Err(PulseError::AlreadyAttached));
        line.detach();
        assert!(!line.is_attached());
    }
}
