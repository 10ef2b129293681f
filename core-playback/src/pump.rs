//! # Event Pump
//!
//! Dedicated worker draining the engine's event queue.
//!
//! The engine wake-up callback may fire on any native thread and does nothing
//! but post a token on a one-slot channel. Wake-ups are edge-triggered and
//! coalesce, so every wake drains the queue until it reports empty.
//!
//! ```text
//! native thread ──wakeup──> [bounded(1)] ──> engine-events thread
//!                                              │ next_event() until None
//!                                              └─> EngineEventHandler::handle_event
//! ```

use crate::client::EngineClient;
use crate::error::Result;
use bridge_traits::engine::EngineEvent;
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, trace, warn, Span};

/// Thread name of the pump worker.
pub const EVENT_THREAD_NAME: &str = "engine-events";

/// Receiver of drained engine events. Called on the pump thread.
pub trait EngineEventHandler: Send + Sync {
    fn handle_event(&self, event: EngineEvent);
}

pub struct EventPump {
    client: Arc<EngineClient>,
    wake: Sender<()>,
    stop: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    span: Span,
}

impl EventPump {
    /// Install the wake-up callback and start draining.
    ///
    /// An initial drain runs immediately to pick up events queued before the
    /// callback was installed.
    pub fn start(
        client: Arc<EngineClient>,
        handler: Weak<dyn EngineEventHandler>,
        span: Span,
    ) -> Result<Self> {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let worker_client = Arc::clone(&client);
        let worker_span = span.clone();
        let worker = thread::Builder::new()
            .name(EVENT_THREAD_NAME.to_string())
            .spawn(move || run(worker_client, handler, wake_rx, stop_rx, worker_span))?;
        let worker_id = worker.thread().id();

        let signal = wake_tx.clone();
        client.set_wakeup_callback(Some(Box::new(move || {
            let _ = signal.try_send(());
        })));
        let _ = wake_tx.try_send(());

        debug!(parent: &span, "Event pump started");

        Ok(Self {
            client,
            wake: wake_tx,
            stop: Mutex::new(Some(stop_tx)),
            worker: Mutex::new(Some(worker)),
            worker_id,
            span,
        })
    }

    /// Request a drain, as the engine's wake-up callback would.
    pub fn wake(&self) {
        let _ = self.wake.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.stop.lock().is_some()
    }

    /// Detach from the engine and join the worker. Idempotent; the join is
    /// skipped when called from the pump thread itself.
    pub fn stop(&self) {
        let Some(stop) = self.stop.lock().take() else {
            return;
        };
        self.client.set_wakeup_callback(None);
        drop(stop);

        let worker = self.worker.lock().take();
        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!(parent: &self.span, "Event pump exited abnormally");
            }
        }
        debug!(parent: &self.span, "Event pump stopped");
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    client: Arc<EngineClient>,
    handler: Weak<dyn EngineEventHandler>,
    wake: Receiver<()>,
    stop: Receiver<()>,
    span: Span,
) {
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(wake) -> message => {
                if message.is_err() || !drain(&client, &handler, &span) {
                    break;
                }
            }
        }
    }
    trace!(parent: &span, "Event pump exiting");
}

/// Handle every queued event. Returns `false` once the pump should exit.
fn drain(client: &EngineClient, handler: &Weak<dyn EngineEventHandler>, span: &Span) -> bool {
    while let Some(event) = client.next_event() {
        let Some(handler) = handler.upgrade() else {
            return false;
        };
        let shutdown = matches!(event, EngineEvent::Shutdown);
        trace!(parent: span, event = event.name(), "Engine event");
        handler.handle_event(event);
        if shutdown {
            debug!(parent: span, "Engine announced shutdown");
            return false;
        }
    }
    true
}
