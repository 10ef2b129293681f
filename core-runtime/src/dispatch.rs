//! # Serial Dispatcher
//!
//! A [`Dispatcher`] backed by one dedicated, named OS thread. Jobs run in
//! submission order and never overlap, which makes a `SerialDispatcher` a
//! drop-in "observing context" for hosts that do not hand the core their own
//! UI-thread dispatcher.
//!
//! A job that panics is logged and discarded; the worker keeps serving the
//! jobs queued after it.

use crate::error::{Error, Result};
use bridge_traits::dispatch::{Dispatcher, Job};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Serial execution context running on its own thread.
pub struct SerialDispatcher {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl SerialDispatcher {
    /// Spawn the worker thread. `name` becomes the thread name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let thread_name = name.clone();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_jobs(&thread_name, receiver))
            .map_err(|source| Error::Spawn {
                name: name.clone(),
                source,
            })?;
        let worker_id = worker.thread().id();

        debug!(dispatcher = %name, "Serial dispatcher started");

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the calling thread is this dispatcher's worker.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Whether the dispatcher still accepts jobs.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Block until every job queued before this call has run.
    ///
    /// Returns `false` if the queue did not drain within `timeout` or the
    /// dispatcher has shut down. Called from the worker itself it returns
    /// `true` immediately.
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.is_current() {
            return true;
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let queued = {
            let guard = self.sender.lock();
            match guard.as_ref() {
                Some(sender) => sender
                    .send(Box::new(move || {
                        let _ = done_tx.send(());
                    }))
                    .is_ok(),
                None => false,
            }
        };

        queued && done_rx.recv_timeout(timeout).is_ok()
    }

    /// Stop accepting jobs, let the queued ones finish and join the worker.
    ///
    /// Idempotent. When invoked from a job running on the worker the join is
    /// skipped; the thread exits after the current job returns.
    pub fn shutdown(&self) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };
        drop(sender);

        let worker = self.worker.lock().take();
        if self.is_current() {
            return;
        }
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!(dispatcher = %self.name, "Dispatcher worker exited abnormally");
            }
        }
        debug!(dispatcher = %self.name, "Serial dispatcher stopped");
    }
}

impl Dispatcher for SerialDispatcher {
    fn dispatch(&self, job: Job) {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            debug!(dispatcher = %self.name, "Dropping job queued after shutdown");
            return;
        };
        if sender.send(job).is_err() {
            warn!(dispatcher = %self.name, "Dispatcher worker is gone, job dropped");
        }
    }
}

impl Drop for SerialDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for SerialDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialDispatcher")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

fn run_jobs(name: &str, receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            error!(
                dispatcher = %name,
                panic = %panic_message(payload.as_ref()),
                "Dispatched job panicked"
            );
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
