//! The measurement agent: resource ownership, lifecycle and control surface.
//!
//! [`MeasurementAgent::init`] acquires everything the pipeline needs, in
//! order: buffer and calibration state, sensor configuration, the capture
//! worker, the sample timer, and finally the pulse line. If any step fails,
//! whatever was already acquired is released in reverse order before the
//! error is returned, so a half-built agent is never reachable.
//!
//! Teardown runs the other way: stop, shut the timer down, let the in-flight
//! capture finish, detach the pulse line, then release the buffer.

use crate::config::{Config, ConfigError};
use crate::control::{Command, ControlError, LifecycleState};
use crate::core::buffer::{MeasurementBuffer, SharedMeasurementBuffer};
use crate::core::calibration::{
    CalibrationState, CycleCounter, MonotonicCycles, SharedCalibrationState,
};
use crate::core::capture::CaptureTask;
use crate::core::measurement::{encode_records, Measurement};
use crate::core::noise::{ChaChaNoise, NoiseSource};
use crate::diagnostics::{create_shared_stats, SharedAcquisitionStats};
use crate::pulse::{PulseError, PulseLine, PulseSynchronizer, SimulatedPulseLine};
use crate::scheduler::{submit_capture, CaptureWorker, SampleTimer, WorkQueue};
use crate::sensor::{PowerMonitor, RegisterBus, SimulatedBus};
use bytes::Bytes;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use uuid::Uuid;

/// External collaborators handed to the agent at initialization.
pub struct AgentResources {
    pub bus: Box<dyn RegisterBus>,
    pub pulse_line: Box<dyn PulseLine>,
    pub clock: Arc<dyn CycleCounter>,
    pub noise: Box<dyn NoiseSource>,
}

impl AgentResources {
    /// Simulated sensor and pulse line, monotonic clock, ChaCha noise.
    pub fn simulated(config: &Config) -> Self {
        let bus = SimulatedBus::new(config.sensor.shunt_voltage, config.sensor.bus_voltage)
            .with_fault_rate(config.sensor.fault_rate, config.noise_seed);

        Self {
            bus: Box::new(bus),
            pulse_line: Box::new(SimulatedPulseLine::new(config.pulse_interval)),
            clock: Arc::new(MonotonicCycles::new()),
            noise: Box::new(ChaChaNoise::new(config.noise_seed)),
        }
    }
}

/// A running capture pipeline.
pub struct MeasurementAgent {
    instance_id: Uuid,
    state: Mutex<LifecycleState>,
    timer: SampleTimer,
    worker: CaptureWorker,
    queue: Option<WorkQueue>,
    pulse_line: Box<dyn PulseLine>,
    buffer: SharedMeasurementBuffer,
    calibration: SharedCalibrationState,
    clock: Arc<dyn CycleCounter>,
    stats: SharedAcquisitionStats,
    shut_down: bool,
}

impl MeasurementAgent {
    /// Acquire all resources and return a stopped agent.
    pub fn init(config: &Config, resources: AgentResources) -> Result<Self, InitError> {
        config.validate().map_err(InitError::Config)?;

        let AgentResources {
            bus,
            mut pulse_line,
            clock,
            noise,
        } = resources;

        let instance_id = Uuid::new_v4();
        let buffer = Arc::new(MeasurementBuffer::with_capacity(config.buffer_capacity));
        let calibration = Arc::new(CalibrationState::new(clock.now()));
        let stats = create_shared_stats();

        let mut sensor = PowerMonitor::new(bus, config.sample_period);
        if let Err(e) = sensor.configure() {
            tracing::warn!("Sensor configuration failed, readings will use defaults: {}", e);
        }

        let task = CaptureTask::new(
            buffer.clone(),
            calibration.clone(),
            clock.clone(),
            sensor,
            noise,
            stats.clone(),
        );
        let (worker, queue) = CaptureWorker::spawn(task).map_err(InitError::Worker)?;

        let timer = SampleTimer::spawn(
            config.sample_period,
            buffer.clone(),
            queue.clone(),
            stats.clone(),
        )
        .map_err(InitError::Timer)?;

        let sync = PulseSynchronizer::new(calibration.clone(), clock.clone());
        pulse_line
            .attach(sync.handler())
            .map_err(InitError::Pulse)?;

        tracing::info!(
            %instance_id,
            sample_period_us = config.sample_period.as_micros() as u64,
            capacity = config.buffer_capacity,
            "Measurement agent initialized"
        );

        Ok(Self {
            instance_id,
            state: Mutex::new(LifecycleState::Stopped),
            timer,
            worker,
            queue: Some(queue),
            pulse_line,
            buffer,
            calibration,
            clock,
            stats,
            shut_down: false,
        })
    }

    /// Begin sampling. Returns `false` if already running.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if *state == LifecycleState::Running || self.shut_down {
            return false;
        }

        self.timer.arm();
        self.buffer.set_running(true);
        *state = LifecycleState::Running;
        tracing::info!("Measurement started");
        true
    }

    /// Stop sampling. Returns `false` if already stopped.
    ///
    /// A capture already handed to the worker still completes.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if *state == LifecycleState::Stopped {
            return false;
        }

        self.buffer.set_running(false);
        self.timer.disarm();
        *state = LifecycleState::Stopped;
        tracing::info!("Measurement stopped");
        true
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Apply a parsed command. Returns `true` if the state changed.
    pub fn execute(&self, command: Command) -> bool {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
        }
    }

    /// Handle raw input from the control channel.
    ///
    /// Returns the number of bytes consumed. Unrecognised input is consumed
    /// without effect; only oversized input is an error.
    pub fn write(&self, input: &[u8]) -> Result<usize, ControlError> {
        match Command::parse(input)? {
            Some(command) => {
                self.execute(command);
            }
            None => tracing::debug!(len = input.len(), "Ignoring unrecognised control input"),
        }
        Ok(input.len())
    }

    /// Take every buffered measurement, oldest first.
    pub fn drain(&self) -> Vec<Measurement> {
        let drained = self.buffer.drain_all();
        self.stats.record_drain(drained.len());
        drained
    }

    /// Drain and encode as wire records.
    ///
    /// The returned length is the number of records present when the drain
    /// started, times the record size. An empty buffer yields zero bytes.
    pub fn read(&self) -> Bytes {
        encode_records(&self.drain())
    }

    /// Ask the worker for one capture outside the timer cadence.
    ///
    /// Follows the same rules as a tick: nothing is enqueued while stopped,
    /// and a request already outstanding absorbs this one.
    pub fn trigger_capture(&self) -> bool {
        match self.queue {
            Some(ref queue) => submit_capture(&self.buffer, queue, &self.stats),
            None => false,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Current buffer occupancy.
    pub fn occupancy(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Counter ticks since the last pulse edge, if one has arrived.
    pub fn drift_since_pulse(&self) -> Option<u64> {
        self.calibration.drift_since_pulse(self.clock.now())
    }

    pub fn stats(&self) -> &SharedAcquisitionStats {
        &self.stats
    }

    pub fn calibration(&self) -> &SharedCalibrationState {
        &self.calibration
    }

    /// Stop everything and release the pipeline's threads.
    ///
    /// Measurements still buffered are discarded; drain first to keep them.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }

        self.stop();
        self.shut_down = true;
        self.timer.shutdown();
        self.queue.take();
        self.worker.shutdown();
        self.pulse_line.detach();

        let discarded = self.buffer.drain_all().len();
        tracing::info!(
            instance_id = %self.instance_id,
            discarded,
            "Measurement agent shut down"
        );
    }
}

impl Drop for MeasurementAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MeasurementAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementAgent")
            .field("instance_id", &self.instance_id)
            .field("state", &self.state())
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

/// Errors that abort initialization.
#[derive(Debug)]
pub enum InitError {
    Config(ConfigError),
    Timer(io::Error),
    Worker(io::Error),
    Pulse(PulseError),
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::Config(e) => write!(f, "Configuration rejected: {e}"),
            InitError::Timer(e) => write!(f, "Failed to create sample timer: {e}"),
            InitError::Worker(e) => write!(f, "Failed to create capture worker: {e}"),
            InitError::Pulse(e) => write!(f, "Failed to attach pulse line: {e}"),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Config(e) => Some(e),
            InitError::Timer(e) | InitError::Worker(e) => Some(e),
            InitError::Pulse(e) => Some(e),
        }
    }
}
