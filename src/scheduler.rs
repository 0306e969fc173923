//! Periodic sample scheduling.
//!
//! The timer never runs a capture itself. On each expiry it hands a request
//! to a single worker through a channel of capacity one, so at most one
//! request is ever outstanding: if the worker is still busy, the tick is
//! coalesced into the pending request rather than queued.
//!
//! ```text
//! SampleTimer ──try_send──▶ [bounded(1)] ──▶ CaptureWorker ──▶ CaptureTask::run
//!   (tick only)                                (one thread)
//! ```
//!
//! After every expiry the timer waits one full period measured from the
//! current time, so a late wake-up shifts the cadence instead of triggering a
//! burst of catch-up ticks.

use crate::core::buffer::SharedMeasurementBuffer;
use crate::core::capture::CaptureTask;
use crate::diagnostics::SharedAcquisitionStats;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Nominal sampling period.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_micros(50);

/// A request for one capture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureRequest {
    pub issued_at: Instant,
}

/// Sending half of the worker queue.
pub type WorkQueue = Sender<CaptureRequest>;

/// Hand one request to the worker unless the agent is stopped.
///
/// Never blocks. Returns `true` if a request was enqueued.
pub fn submit_capture(
    buffer: &SharedMeasurementBuffer,
    queue: &WorkQueue,
    stats: &SharedAcquisitionStats,
) -> bool {
    if !buffer.is_running() {
        return false;
    }

    match queue.try_send(CaptureRequest {
        issued_at: Instant::now(),
    }) {
        Ok(()) => {
            stats.record_enqueued();
            true
        }
        Err(TrySendError::Full(_)) => {
            stats.record_coalesced();
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// The single deferred worker that runs captures serially.
pub struct CaptureWorker {
    queue: Option<WorkQueue>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Spawn the worker thread, returning it with a handle for submitting
    /// requests. The thread runs until every queue handle is dropped.
    pub fn spawn(mut task: CaptureTask) -> io::Result<(Self, WorkQueue)> {
        let (queue, requests) = bounded::<CaptureRequest>(1);

        let handle = thread::Builder::new()
            .name("capture-worker".to_string())
            .spawn(move || {
                for request in requests.iter() {
                    let outcome = task.run();
                    tracing::trace!(
                        queued_us = request.issued_at.elapsed().as_micros() as u64,
                        ?outcome,
                        "Capture finished"
                    );
                }
                tracing::debug!("Capture worker exiting");
            })?;

        let worker = Self {
            queue: Some(queue.clone()),
            thread_handle: Some(handle),
        };
        Ok((worker, queue))
    }

    /// Close the queue and wait for the in-flight capture to finish.
    ///
    /// Other queue handles (the timer's) must already be dropped, otherwise
    /// this waits for them.
    pub fn shutdown(&mut self) {
        self.queue.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum TimerCommand {
    Arm,
    Disarm,
}

/// Recurring timer feeding the capture worker.
///
/// The thread is created once and parks while disarmed; arming and
/// disarming only send it a command.
pub struct SampleTimer {
    commands: Option<Sender<TimerCommand>>,
    armed: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SampleTimer {
    pub fn spawn(
        period: Duration,
        buffer: SharedMeasurementBuffer,
        queue: WorkQueue,
        stats: SharedAcquisitionStats,
    ) -> io::Result<Self> {
        let (commands, command_rx) = bounded::<TimerCommand>(4);

        let handle = thread::Builder::new()
            .name("sample-timer".to_string())
            .spawn(move || run_timer_loop(period, command_rx, &buffer, &queue, &stats))?;

        Ok(Self {
            commands: Some(commands),
            armed: Arc::new(AtomicBool::new(false)),
            thread_handle: Some(handle),
        })
    }

    /// Start ticking. Returns `false` if the timer was already armed.
    pub fn arm(&self) -> bool {
        if self
            .armed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.send(TimerCommand::Arm);
        true
    }

    /// Stop ticking. Returns `false` if the timer was not armed.
    pub fn disarm(&self) -> bool {
        if self
            .armed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.send(TimerCommand::Disarm);
        true
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Disarm, stop the timer thread and release its queue handle.
    pub fn shutdown(&mut self) {
        self.armed.store(false, Ordering::SeqCst);
        self.commands.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn send(&self, command: TimerCommand) {
        if let Some(ref commands) = self.commands {
            let _ = commands.send(command);
        }
    }
}

impl Drop for SampleTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer_loop(
    period: Duration,
    commands: Receiver<TimerCommand>,
    buffer: &SharedMeasurementBuffer,
    queue: &WorkQueue,
    stats: &SharedAcquisitionStats,
) {
    let mut armed = false;

    loop {
        let command = if armed {
            match commands.recv_timeout(period) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => {
                    stats.record_tick();
                    submit_capture(buffer, queue, stats);
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => command,
                Err(_) => break,
            }
        };

        armed = matches!(command, TimerCommand::Arm);
    }

    tracing::debug!("Sample timer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::MeasurementBuffer;
    use crate::diagnostics::create_shared_stats;

    #[test]
    fn test_submit_skipped_while_stopped() {
        let buffer = Arc::new(MeasurementBuffer::new());
        let stats = create_shared_stats();
        let (queue, requests) = bounded(1);

        assert!(!submit_capture(&buffer, &queue, &stats));
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn test_submit_coalesces_when_request_outstanding() {
        let buffer = Arc::new(MeasurementBuffer::new());
        buffer.set_running(true);
        let stats = create_shared_stats();
        let (queue, requests) = bounded(1);

        assert!(submit_capture(&buffer, &queue, &stats));
        assert!(!submit_capture(&buffer, &queue, &stats));
        assert!(!submit_capture(&buffer, &queue, &stats));

        assert_eq!(requests.len(), 1);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.enqueued, 1);
        assert_eq!(snapshot.coalesced, 2);
    }

    #[test]
    fn test_timer_arm_is_idempotent() {
        let buffer = Arc::new(MeasurementBuffer::new());
        let stats = create_shared_stats();
        let (queue, _requests) = bounded(1);
        let mut timer =
            SampleTimer::spawn(Duration::from_millis(5), buffer, queue, stats).unwrap();

        assert!(timer.arm());
        assert!(!timer.arm());
        assert!(timer.is_armed());
        assert!(timer.disarm());
        assert!(!timer.disarm());
        timer.shutdown();
    }

    #[test]
    fn test_armed_timer_ticks() {
        let buffer = Arc::new(MeasurementBuffer::new());
        buffer.set_running(true);
        let stats = create_shared_stats();
        let (queue, requests) = bounded(1);
        let mut timer =
            SampleTimer::spawn(Duration::from_millis(1), buffer, queue, stats.clone()).unwrap();

        timer.arm();
        let request = requests.recv_timeout(Duration::from_secs(2));
        timer.shutdown();

        assert!(request.is_ok());
        assert!(stats.snapshot().ticks >= 1);
    }

    #[test]
    fn test_disarmed_timer_is_silent() {
        let buffer = Arc::new(MeasurementBuffer::new());
        buffer.set_running(true);
        let stats = create_shared_stats();
        let (queue, requests) = bounded(1);
        let mut timer =
            SampleTimer::spawn(Duration::from_millis(1), buffer, queue, stats.clone()).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        timer.shutdown();

        assert!(requests.try_recv().is_err());
        assert_eq!(stats.snapshot().ticks, 0);
    }
}
