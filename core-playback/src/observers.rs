//! # Periodic Time Observers
//!
//! Registry of callbacks fired on a shared repeating timer.
//!
//! - The first registration starts the timer with its interval; later
//!   registrations share it.
//! - Removing the last registration stops the timer.
//! - Every tick samples the playback time once and hands the sample to each
//!   observer on the dispatcher it registered with. A panicking observer is
//!   logged and does not affect the others.

use crate::error::Result;
use crate::status::PlaybackTime;
use bridge_traits::dispatch::Dispatcher;
use core_runtime::dispatch::panic_message;
use core_runtime::timer::RepeatingTimer;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, Span};
use uuid::Uuid;

/// Opaque handle returned by a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(Uuid);

impl fmt::Display for ObserverToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub type TimeCallback = Arc<dyn Fn(PlaybackTime) + Send + Sync + 'static>;

/// Produces the sample handed to observers. `None` skips the tick.
pub type TimeSampler = Arc<dyn Fn() -> Option<PlaybackTime> + Send + Sync + 'static>;

struct Registration {
    callback: TimeCallback,
    dispatcher: Arc<dyn Dispatcher>,
}

type Registrations = Arc<Mutex<HashMap<ObserverToken, Registration>>>;

pub struct TimeObserverHub {
    observers: Registrations,
    timer: Mutex<Option<RepeatingTimer>>,
    sampler: TimeSampler,
    span: Span,
}

impl TimeObserverHub {
    pub fn new(sampler: TimeSampler, span: Span) -> Self {
        Self {
            observers: Arc::new(Mutex::new(HashMap::new())),
            timer: Mutex::new(None),
            sampler,
            span,
        }
    }

    /// Register `callback`, delivered on `dispatcher` every `interval`
    /// (the interval only matters for the registration that starts the timer).
    pub fn add(
        &self,
        interval: Duration,
        dispatcher: Arc<dyn Dispatcher>,
        callback: TimeCallback,
    ) -> Result<ObserverToken> {
        let token = ObserverToken(Uuid::new_v4());
        self.observers.lock().insert(
            token,
            Registration {
                callback,
                dispatcher,
            },
        );

        let mut timer = self.timer.lock();
        if timer.is_none() {
            let observers = Arc::clone(&self.observers);
            let sampler = Arc::clone(&self.sampler);
            let span = self.span.clone();
            match RepeatingTimer::start("time-observers", interval, move || {
                tick(&observers, &sampler, &span)
            }) {
                Ok(started) => {
                    debug!(parent: &self.span, interval_ms = interval.as_millis() as u64, "Time observer timer started");
                    *timer = Some(started);
                }
                Err(err) => {
                    drop(timer);
                    self.observers.lock().remove(&token);
                    return Err(err.into());
                }
            }
        }

        Ok(token)
    }

    /// Unregister `token`. Returns `false` if it was not registered.
    pub fn remove(&self, token: ObserverToken) -> bool {
        let (removed, now_empty) = {
            let mut observers = self.observers.lock();
            let removed = observers.remove(&token).is_some();
            (removed, observers.is_empty())
        };

        if now_empty {
            let stopped = self.timer.lock().take();
            if let Some(timer) = stopped {
                timer.stop();
                debug!(parent: &self.span, "Time observer timer stopped");
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }

    /// Whether the shared timer is running.
    pub fn is_ticking(&self) -> bool {
        self.timer.lock().as_ref().is_some_and(RepeatingTimer::is_running)
    }

    /// Drop every registration and stop the timer.
    pub fn stop(&self) {
        self.observers.lock().clear();
        let stopped = self.timer.lock().take();
        if let Some(timer) = stopped {
            timer.stop();
        }
    }
}

impl Drop for TimeObserverHub {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tick(observers: &Registrations, sampler: &TimeSampler, span: &Span) {
    let targets: Vec<(TimeCallback, Arc<dyn Dispatcher>)> = observers
        .lock()
        .values()
        .map(|r| (Arc::clone(&r.callback), Arc::clone(&r.dispatcher)))
        .collect();
    if targets.is_empty() {
        return;
    }

    let Some(sample) = sampler() else {
        return;
    };

    for (callback, dispatcher) in targets {
        let span = span.clone();
        dispatcher.dispatch(Box::new(move || {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(sample))) {
                error!(
                    parent: &span,
                    panic = %panic_message(payload.as_ref()),
                    "Time observer panicked"
                );
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TimeControlStatus;
    use bridge_traits::dispatch::InlineDispatcher;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    fn sampler() -> TimeSampler {
        Arc::new(|| {
            Some(PlaybackTime {
                current: Duration::from_secs(1),
                duration: Duration::from_secs(10),
                status: TimeControlStatus::Playing,
            })
        })
    }

    fn counter() -> (Arc<AtomicUsize>, TimeCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_timer_lifecycle_follows_registrations() {
        let hub = TimeObserverHub::new(sampler(), Span::none());
        assert!(!hub.is_ticking());

        let (_, a) = counter();
        let (_, b) = counter();
        let first = hub.add(Duration::from_millis(10), Arc::new(InlineDispatcher), a).unwrap();
        let second = hub.add(Duration::from_millis(50), Arc::new(InlineDispatcher), b).unwrap();
        assert_ne!(first, second);
        assert!(hub.is_ticking());

        assert!(hub.remove(first));
        assert!(hub.is_ticking());
        assert!(!hub.remove(first));

        assert!(hub.remove(second));
        assert!(!hub.is_ticking());
        assert!(hub.is_empty());
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let hub = TimeObserverHub::new(sampler(), Span::none());
        let (count, callback) = counter();

        hub.add(
            Duration::from_millis(10),
            Arc::new(InlineDispatcher),
            Arc::new(|_| panic!("observer failed")),
        )
        .unwrap();
        hub.add(Duration::from_millis(10), Arc::new(InlineDispatcher), callback)
            .unwrap();

        assert!(wait_for(|| count.load(Ordering::SeqCst) >= 2));
        hub.stop();
    }

    #[test]
    fn test_empty_sample_skips_tick() {
        let hub = TimeObserverHub::new(Arc::new(|| None), Span::none());
        let (count, callback) = counter();
        hub.add(Duration::from_millis(5), Arc::new(InlineDispatcher), callback)
            .unwrap();

        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let hub = TimeObserverHub::new(sampler(), Span::none());
        let (_, callback) = counter();
        assert!(hub
            .add(Duration::ZERO, Arc::new(InlineDispatcher), callback)
            .is_err());
        assert!(hub.is_empty());
    }
}
