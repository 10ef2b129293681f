//! Integration tests for periodic time observers registered on a player.

mod support;

use bridge_traits::engine::PropertyValue;
use bridge_traits::Dispatcher;
use core_playback::{PlaybackTime, TimeControlStatus};
use core_runtime::SerialDispatcher;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use support::{wait_until, Harness};

fn counter() -> (Arc<AtomicUsize>, impl Fn(PlaybackTime) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    (count, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn test_observer_receives_live_samples() {
    let h = Harness::new();
    h.engine.set_property("time-pos", PropertyValue::Double(4.0));
    h.engine.set_property("duration", PropertyValue::Double(8.0));

    let samples = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&samples);
    h.player
        .add_periodic_time_observer(Duration::from_millis(10), None, move |time| {
            sink.lock().push(time)
        })
        .unwrap();

    assert!(wait_until(|| !samples.lock().is_empty()));
    let first = samples.lock()[0];
    assert_eq!(first.current, Duration::from_secs(4));
    assert_eq!(first.duration, Duration::from_secs(8));
    assert_eq!(first.status, TimeControlStatus::Paused);
    assert_eq!(first.progress(), 0.5);
}

#[test]
fn test_removing_one_observer_keeps_the_other() {
    let h = Harness::new();
    let (fast_count, fast) = counter();
    let (slow_count, slow) = counter();

    let fast_token = h
        .player
        .add_periodic_time_observer(Duration::from_millis(10), None, fast)
        .unwrap();
    let slow_token = h
        .player
        .add_periodic_time_observer(Duration::from_millis(50), None, slow)
        .unwrap();
    assert!(wait_until(|| fast_count.load(Ordering::SeqCst) >= 2));

    assert!(h.player.remove_time_observer(fast_token));
    // A tick sampled just before the removal may still be in flight.
    thread::sleep(Duration::from_millis(20));
    h.flush();
    let frozen = fast_count.load(Ordering::SeqCst);
    let before = slow_count.load(Ordering::SeqCst);

    assert!(wait_until(|| slow_count.load(Ordering::SeqCst) >= before + 2));
    assert_eq!(fast_count.load(Ordering::SeqCst), frozen);

    assert!(h.player.remove_time_observer(slow_token));
    assert!(!h.player.remove_time_observer(slow_token));
    h.flush();
    let stopped = slow_count.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(slow_count.load(Ordering::SeqCst), stopped);
}

#[test]
fn test_observer_runs_on_requested_dispatcher() {
    let h = Harness::new();
    let ui = Arc::new(SerialDispatcher::new("ui").unwrap());

    let on_ui = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&on_ui);
    let probe = Arc::clone(&ui);
    let dispatcher: Arc<dyn Dispatcher> = ui.clone();
    h.player
        .add_periodic_time_observer(Duration::from_millis(10), Some(dispatcher), move |_| {
            sink.lock().push(probe.is_current())
        })
        .unwrap();

    assert!(wait_until(|| on_ui.lock().len() >= 2));
    assert!(on_ui.lock().iter().all(|current| *current));
}

#[test]
fn test_zero_interval_is_rejected() {
    let h = Harness::new();
    let (_, callback) = counter();
    assert!(h
        .player
        .add_periodic_time_observer(Duration::ZERO, None, callback)
        .is_err());
}
