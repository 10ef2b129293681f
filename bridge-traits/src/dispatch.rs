//! Execution contexts.
//!
//! Engine events are discovered on a background worker, but published player
//! state may only change on one designated "observing" context (conceptually
//! the host's UI thread). Hosts hand that context to the core as a
//! [`Dispatcher`]; observers may also name their own.

use crate::platform::PlatformSendSync;

/// A unit of work queued onto a dispatcher.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Serial execution context.
///
/// Jobs submitted from one thread must run in submission order and never
/// concurrently with each other.
pub trait Dispatcher: PlatformSendSync {
    /// Queue `job` for execution.
    fn dispatch(&self, job: Job);
}

/// Runs every job immediately on the calling thread.
///
/// Useful for hosts that already serialize calls into the core, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: Job) {
        job();
    }
}
