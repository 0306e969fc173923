//! Integration tests for the capture pipeline

use measurement_agent::core::{
    CalibrationState, CycleCounter, ManualCycles, MonotonicCycles, NoiseSource, SequenceNoise,
};
use measurement_agent::diagnostics::create_shared_stats;
use measurement_agent::pulse::{EdgeHandler, PulseError};
use measurement_agent::sensor::{DEFAULT_ENERGY_J, DEFAULT_TEMPERATURE_C};
use measurement_agent::{
    decode_records, AgentResources, CaptureOutcome, CaptureTask, Config, ControlError, InitError,
    LifecycleState, MeasurementAgent, MeasurementBuffer, PowerMonitor, PulseLine,
    SimulatedBus, SimulatedPulseLine, RECORD_SIZE,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Timer and pulse line too slow to fire during a test.
fn quiet_config() -> Config {
    let mut config = Config::default();
    config.sample_period = Duration::from_secs(3600);
    config.pulse_interval = Duration::from_secs(3600);
    config.noise_seed = Some(1);
    config
}

fn capture_task(
    buffer: Arc<MeasurementBuffer>,
    clock: Arc<ManualCycles>,
) -> (CaptureTask, Arc<CalibrationState>) {
    let calibration = Arc::new(CalibrationState::new(0));
    let sensor = PowerMonitor::new(
        Box::new(SimulatedBus::new(2100, 1250 << 3)),
        Duration::from_micros(50),
    );
    let task = CaptureTask::new(
        buffer,
        calibration.clone(),
        clock,
        sensor,
        Box::new(SequenceNoise::new(vec![0])),
        create_shared_stats(),
    );
    (task, calibration)
}

#[test]
fn test_cycle_deltas_follow_counter() {
    let buffer = Arc::new(MeasurementBuffer::new());
    buffer.set_running(true);
    let clock = Arc::new(ManualCycles::new(0));
    let (mut task, calibration) = capture_task(buffer.clone(), clock.clone());

    for value in [100, 250, 370] {
        clock.set(value);
        assert_eq!(task.run(), CaptureOutcome::Stored);
    }

    let batch = buffer.drain_all();
    let deltas: Vec<f64> = batch.iter().map(|m| m.dimensions[0]).collect();
    assert_eq!(deltas, vec![100.0, 150.0, 120.0]);
    assert_eq!(calibration.last_cycle_count(), 370);

    // dims[6] is the raw counter modulo 1000
    assert_eq!(batch[2].dimensions[6], 370.0);
    // A counter that did not move while sampling gives zero latency
    assert!(batch.iter().all(|m| m.latency == 0.0));
}

#[test]
fn test_full_buffer_drops_newest() {
    let buffer = Arc::new(MeasurementBuffer::with_capacity(3));
    buffer.set_running(true);
    let clock = Arc::new(ManualCycles::new(0));
    let (mut task, _) = capture_task(buffer.clone(), clock.clone());

    let mut outcomes = Vec::new();
    for step in 1..=5 {
        clock.set(step * 10);
        outcomes.push(task.run());
    }

    assert_eq!(
        outcomes,
        vec![
            CaptureOutcome::Stored,
            CaptureOutcome::Stored,
            CaptureOutcome::Stored,
            CaptureOutcome::Dropped,
            CaptureOutcome::Dropped,
        ]
    );

    let kept: Vec<f64> = buffer
        .drain_all()
        .iter()
        .map(|m| m.dimensions[6])
        .collect();
    assert_eq!(kept, vec![10.0, 20.0, 30.0]);

    // Draining frees space again
    clock.set(60);
    assert_eq!(task.run(), CaptureOutcome::Stored);
}

#[test]
fn test_capture_after_stop_appends_nothing() {
    let buffer = Arc::new(MeasurementBuffer::new());
    let clock = Arc::new(ManualCycles::new(0));
    let (mut task, calibration) = capture_task(buffer.clone(), clock.clone());

    buffer.set_running(true);
    clock.set(10);
    assert_eq!(task.run(), CaptureOutcome::Stored);

    buffer.set_running(false);
    clock.set(20);
    assert_eq!(task.run(), CaptureOutcome::Skipped);

    assert_eq!(buffer.len(), 1);
    assert_eq!(calibration.last_cycle_count(), 10);
}

#[test]
fn test_agent_samples_while_running() {
    let mut config = quiet_config();
    config.sample_period = Duration::from_micros(200);
    let mut agent = MeasurementAgent::init(&config, AgentResources::simulated(&config)).unwrap();

    assert_eq!(agent.write(b"start\n"), Ok(6));
    assert!(wait_for(Duration::from_secs(5), || agent.occupancy() >= 5));

    assert_eq!(agent.write(b"stop\n"), Ok(5));
    assert_eq!(agent.state(), LifecycleState::Stopped);

    // Let an in-flight capture land, then nothing more may arrive.
    thread::sleep(Duration::from_millis(50));
    let first = agent.drain();
    assert!(first.len() >= 5);
    assert!(first.len() <= agent.capacity());
    assert!(first.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    thread::sleep(Duration::from_millis(50));
    assert!(agent.drain().is_empty());

    let snapshot = agent.stats().snapshot();
    assert!(snapshot.ticks >= 5);
    assert!(snapshot.stored >= 5);

    agent.shutdown();
}

#[test]
fn test_read_length_matches_occupancy() {
    let mut config = quiet_config();
    config.sample_period = Duration::from_micros(200);
    let agent = MeasurementAgent::init(&config, AgentResources::simulated(&config)).unwrap();

    agent.start();
    assert!(wait_for(Duration::from_secs(5), || agent.occupancy() >= 3));
    agent.stop();
    thread::sleep(Duration::from_millis(50));

    let count = agent.occupancy();
    let records = agent.read();
    assert_eq!(records.len(), count * RECORD_SIZE);

    let decoded = decode_records(&records).unwrap();
    assert_eq!(decoded.len(), count);
    assert!(decoded.iter().all(|m| m.temperature.is_finite()));

    // Drained destructively
    assert!(agent.read().is_empty());
}

#[test]
fn test_manual_trigger_with_absent_sensor_uses_defaults() {
    let config = quiet_config();
    let resources = AgentResources {
        bus: Box::new(SimulatedBus::absent()),
        pulse_line: Box::new(SimulatedPulseLine::new(config.pulse_interval)),
        clock: Arc::new(MonotonicCycles::new()),
        noise: Box::new(SequenceNoise::new(vec![7])),
    };
    let agent = MeasurementAgent::init(&config, resources).unwrap();

    // Stopped: nothing is enqueued
    assert!(!agent.trigger_capture());

    agent.start();
    assert!(agent.trigger_capture());
    assert!(wait_for(Duration::from_secs(5), || agent.occupancy() == 1));

    let batch = agent.drain();
    assert_eq!(batch[0].temperature, DEFAULT_TEMPERATURE_C);
    assert_eq!(batch[0].energy, DEFAULT_ENERGY_J);
    assert_eq!(batch[0].dimensions[3], DEFAULT_TEMPERATURE_C);
    assert_eq!(agent.stats().snapshot().sensor_faults, 2);
}

#[test]
fn test_control_rejects_oversized_input() {
    let config = quiet_config();
    let agent = MeasurementAgent::init(&config, AgentResources::simulated(&config)).unwrap();

    let input = [b'x'; 40];
    assert_eq!(
        agent.write(&input),
        Err(ControlError::InvalidArgument { len: 40 })
    );
    assert_eq!(agent.write(b"Start"), Ok(5));
    assert_eq!(agent.state(), LifecycleState::Stopped);
}

/// A pulse line whose edges are fired by the test.
#[derive(Clone, Default)]
struct ManualPulseLine {
    handler: Arc<Mutex<Option<EdgeHandler>>>,
}

impl ManualPulseLine {
    fn fire(&self) {
        if let Some(handler) = self.handler.lock().clone() {
            handler();
        }
    }
}

impl PulseLine for ManualPulseLine {
    fn attach(&mut self, handler: EdgeHandler) -> Result<(), PulseError> {
        *self.handler.lock() = Some(handler);
        Ok(())
    }

    fn detach(&mut self) {
        self.handler.lock().take();
    }
}

#[test]
fn test_pulse_edges_update_calibration() {
    let config = quiet_config();
    let clock = Arc::new(ManualCycles::new(1_000));
    let line = ManualPulseLine::default();
    let resources = AgentResources {
        bus: Box::new(SimulatedBus::new(2100, 1250 << 3)),
        pulse_line: Box::new(line.clone()),
        clock: clock.clone(),
        noise: Box::new(SequenceNoise::new(vec![0])),
    };
    let mut agent = MeasurementAgent::init(&config, resources).unwrap();

    assert_eq!(agent.drift_since_pulse(), None);

    clock.set(5_000);
    line.fire();
    assert_eq!(agent.calibration().pulse_cycle_count(), 5_000);

    clock.advance(250);
    assert_eq!(agent.drift_since_pulse(), Some(250));

    line.fire();
    assert_eq!(agent.calibration().pulse_count(), 2);
    assert_eq!(agent.drift_since_pulse(), Some(0));

    agent.shutdown();
    assert!(line.handler.lock().is_none());
    assert_eq!(clock.now(), 5_250);
}

struct FailingPulseLine;

impl PulseLine for FailingPulseLine {
    fn attach(&mut self, _handler: EdgeHandler) -> Result<(), PulseError> {
        Err(PulseError::Unavailable("line claimed elsewhere".to_string()))
    }

    fn detach(&mut self) {}
}

/// Noise source that reports when it is dropped.
struct DropProbe {
    dropped: Arc<AtomicBool>,
}

impl NoiseSource for DropProbe {
    fn next_u32(&mut self) -> u32 {
        0
    }
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_failed_pulse_attach_releases_worker() {
    let config = quiet_config();
    let dropped = Arc::new(AtomicBool::new(false));
    let resources = AgentResources {
        bus: Box::new(SimulatedBus::new(2100, 1250 << 3)),
        pulse_line: Box::new(FailingPulseLine),
        clock: Arc::new(MonotonicCycles::new()),
        noise: Box::new(DropProbe {
            dropped: dropped.clone(),
        }),
    };

    let result = MeasurementAgent::init(&config, resources);
    assert!(matches!(result, Err(InitError::Pulse(_))));
    // The worker thread has been joined and its task released
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn test_sensor_configuration_written_at_init() {
    let config = quiet_config();
    let bus = SimulatedBus::new(2100, 1250 << 3);
    let writes = bus.write_log();
    let resources = AgentResources {
        bus: Box::new(bus),
        pulse_line: Box::new(ManualPulseLine::default()),
        clock: Arc::new(MonotonicCycles::new()),
        noise: Box::new(SequenceNoise::new(vec![0])),
    };

    let _agent = MeasurementAgent::init(&config, resources).unwrap();

    let writes = writes.lock().clone();
    assert_eq!(writes, vec![(0x00, 0x2898), (0x05, 0x1000)]);
}
