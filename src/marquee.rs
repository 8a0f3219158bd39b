// src/marquee.rs
//
// Marquee effect: one lit LED stepping along the strip until cancelled.
// The runner thread owns the register writer for its whole lifetime and
// hands it back through the join handle, so the foreground can only write
// again once the runner has cleared its LED and exited.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::commands::{led_off, Payload};
use crate::device::RegisterWriter;
use crate::error::TransportError;

pub const DEFAULT_DWELL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    CancelRequested,
    Stopped,
}

#[derive(Debug, Default)]
pub struct MarqueeReport {
    pub steps: usize,
    pub last_index: Option<u8>,
    pub error: Option<TransportError>,
}

pub struct Marquee<W: RegisterWriter + 'static> {
    state: RunnerState,
    cancel: Option<Sender<()>>,
    worker: Option<JoinHandle<(W, MarqueeReport)>>,
}

impl<W: RegisterWriter + 'static> Marquee<W> {
    /// Starts sweeping `template` over indices `1..led_count`.
    pub fn spawn(writer: W, template: Payload, led_count: u8, dwell: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        info!(%template, led_count, ?dwell, "marquee started");

        let worker = thread::spawn(move || {
            let mut writer = writer;
            let report = sweep(&mut writer, template, led_count, dwell, || {
                match rx.recv_timeout(dwell) {
                    Err(RecvTimeoutError::Timeout) => false,
                    // a dropped handle counts as a stop request
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                }
            });
            (writer, report)
        });

        Self {
            state: RunnerState::Running,
            cancel: Some(tx),
            worker: Some(worker),
        }
    }

    pub fn state(&self) -> RunnerState {
        match (&self.state, &self.worker) {
            (RunnerState::Running, Some(w)) if w.is_finished() => RunnerState::Stopped,
            (state, _) => *state,
        }
    }

    /// Sends the single stop signal. Returns false if it was already sent.
    pub fn cancel(&mut self) -> bool {
        if self.state != RunnerState::Running {
            return false;
        }
        if let Some(tx) = self.cancel.take() {
            // the runner may already have exited on its own; that is fine
            if tx.send(()).is_err() {
                debug!("marquee already gone when cancelled");
            }
        }
        self.state = RunnerState::CancelRequested;
        true
    }

    /// Cancels, waits for the runner to clear its LED, and returns the writer.
    pub fn stop(mut self) -> Result<(W, MarqueeReport), TransportError> {
        self.cancel();
        let worker = self.worker.take().ok_or(TransportError::Unavailable)?;
        let result = worker.join().map_err(|_| {
            error!("marquee runner panicked");
            TransportError::Unavailable
        });
        self.state = RunnerState::Stopped;

        let (writer, report) = result?;
        info!(steps = report.steps, last_index = ?report.last_index, "marquee stopped");
        Ok((writer, report))
    }
}

impl<W: RegisterWriter + 'static> Drop for Marquee<W> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.cancel();
            let _ = worker.join();
        }
    }
}

/// Runs the sweep until `wait` reports a stop request or a write fails.
///
/// `wait` blocks for one dwell interval and returns true when the runner
/// must stop. The LED lit by the last step is always written off before
/// returning.
fn sweep<W, F>(
    writer: &mut W,
    template: Payload,
    led_count: u8,
    dwell: Duration,
    mut wait: F,
) -> MarqueeReport
where
    W: RegisterWriter,
    F: FnMut() -> bool,
{
    let mut report = MarqueeReport::default();
    if led_count < 2 {
        return report;
    }

    'sweep: loop {
        for i in 1..led_count {
            if let Err(e) = writer.send(&template.with_index(i)) {
                error!(index = i, error = %e, "marquee step write failed");
                if let Err(clear) = writer.send(&led_off(i)) {
                    warn!(index = i, error = %clear, "could not clear LED after failed step");
                }
                report.error = Some(e);
                break 'sweep;
            }
            report.steps += 1;
            report.last_index = Some(i);

            let stop = wait();
            if let Err(e) = writer.send(&led_off(i)) {
                error!(index = i, error = %e, "marquee clear write failed");
                report.error = Some(e);
                break 'sweep;
            }
            if stop {
                break 'sweep;
            }
        }
        debug!(?dwell, "marquee sweep wrapped");
    }

    report
}
