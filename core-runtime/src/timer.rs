//! # Scheduling Primitives
//!
//! - [`RepeatingTimer`] fires a tick closure on a fixed interval from its own
//!   named thread until stopped.
//! - [`Timeout`] runs a closure once after a delay unless cancelled first.
//!
//! Both are built on `crossbeam_channel::Receiver::recv_timeout`: the control
//! channel carries nothing, dropping its sender is the stop signal. A tick
//! runs to completion before the next interval starts, so ticks never overlap.

use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{trace, warn};

// ============================================================================
// Repeating timer
// ============================================================================

/// Fixed-interval timer running on a dedicated thread.
pub struct RepeatingTimer {
    name: String,
    interval: Duration,
    control: Worker,
}

impl RepeatingTimer {
    /// Start ticking every `interval`. The first tick fires one interval
    /// after the call.
    pub fn start<F>(name: impl Into<String>, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        if interval.is_zero() {
            return Err(Error::Config(format!(
                "Timer '{}' needs a non-zero interval",
                name
            )));
        }

        let control = Worker::spawn(&name, move |stop| loop {
            match stop.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => tick(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;

        trace!(timer = %name, interval_ms = interval.as_millis() as u64, "Timer started");
        Ok(Self {
            name,
            interval,
            control,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Stop the timer. A tick already running finishes first.
    ///
    /// Safe to call from inside the tick closure; the join is skipped then.
    pub fn stop(&self) {
        if self.control.stop() {
            trace!(timer = %self.name, "Timer stopped");
        }
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for RepeatingTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatingTimer")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

// ============================================================================
// One-shot timeout
// ============================================================================

/// Runs a closure once after a delay unless cancelled first.
pub struct Timeout {
    name: String,
    control: Worker,
}

impl Timeout {
    pub fn start<F>(name: impl Into<String>, after: Duration, on_expiry: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let control = Worker::spawn(&name, move |stop| {
            if let Err(RecvTimeoutError::Timeout) = stop.recv_timeout(after) {
                on_expiry();
            }
        })?;
        Ok(Self { name, control })
    }

    /// Prevent the closure from running. No effect once it has fired.
    pub fn cancel(&self) {
        if self.control.stop() {
            trace!(timeout = %self.name, "Timeout cancelled");
        }
    }

    /// Whether the timeout is still waiting (or running its closure).
    pub fn is_pending(&self) -> bool {
        self.control.is_running() && !self.control.finished()
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeout")
            .field("name", &self.name)
            .field("pending", &self.is_pending())
            .finish()
    }
}

// ============================================================================
// Shared worker plumbing
// ============================================================================

struct Worker {
    name: String,
    stop: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl Worker {
    fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop_rx))
            .map_err(|source| Error::Spawn {
                name: name.to_string(),
                source,
            })?;
        let thread_id = handle.thread().id();

        Ok(Self {
            name: name.to_string(),
            stop: Mutex::new(Some(stop_tx)),
            handle: Mutex::new(Some(handle)),
            thread_id,
        })
    }

    fn is_running(&self) -> bool {
        self.stop.lock().is_some()
    }

    fn finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Returns `true` if this call performed the stop.
    fn stop(&self) -> bool {
        let Some(stop) = self.stop.lock().take() else {
            return false;
        };
        drop(stop);

        let handle = self.handle.lock().take();
        if thread::current().id() == self.thread_id {
            return true;
        }
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(worker = %self.name, "Timer thread panicked");
            }
        }
        true
    }
}
