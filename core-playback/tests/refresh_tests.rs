//! Integration tests for display refresh rate matching
//!
//! Verifies that [`RefreshSync`]:
//! - Tunes to the content frame rate while playing
//! - Falls back to the display rate when the content rate is unknown
//! - Does nothing while paused or when disabled

mod support;

use bridge_traits::engine::PropertyValue;
use bridge_traits::render::DisplayInfo;
use bridge_traits::FixedDisplay;
use core_playback::{PlaybackConfig, RefreshSync, TimeControlStatus};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use support::{wait_until, Harness};

mock! {
    pub Display {}
    impl DisplayInfo for Display {
        fn refresh_rate(&self) -> u32;
    }
}

fn playing(config: PlaybackConfig) -> Harness {
    let h = Harness::with_config(config);
    h.player.play(None);
    assert!(wait_until(
        || h.player.time_control_status() == TimeControlStatus::Playing
    ));
    h
}

#[test]
fn test_tunes_to_content_then_back_to_display() {
    let h = playing(PlaybackConfig::default());
    let sync = RefreshSync::new(&h.player, Arc::new(FixedDisplay::new(60)));

    h.engine
        .set_property("container-fps", PropertyValue::Double(23.976));
    assert_eq!(sync.check_and_update(), Some(24));
    assert_eq!(h.player.current_refresh_rate(), 24);
    assert_eq!(h.engine.writes_of("display-fps-override"), vec!["24"]);

    // Already tuned.
    assert_eq!(sync.check_and_update(), None);

    h.engine
        .set_property("container-fps", PropertyValue::Double(0.0));
    assert_eq!(sync.check_and_update(), Some(60));
    assert_eq!(h.player.current_refresh_rate(), 60);
}

#[test]
fn test_unknown_display_rate_uses_fallback() {
    let h = playing(PlaybackConfig::default());
    let mut display = MockDisplay::new();
    display.expect_refresh_rate().return_const(0u32);
    let sync = RefreshSync::new(&h.player, Arc::new(display));

    h.engine
        .set_property("container-fps", PropertyValue::Double(60.0));
    assert_eq!(sync.check_and_update(), None);

    h.engine
        .set_property("container-fps", PropertyValue::Double(25.0));
    assert_eq!(sync.check_and_update(), Some(25));
}

#[test]
fn test_no_adjustment_while_paused() {
    let h = Harness::new();
    let sync = RefreshSync::new(&h.player, Arc::new(FixedDisplay::new(60)));

    h.engine
        .set_property("container-fps", PropertyValue::Double(24.0));
    assert_eq!(sync.check_and_update(), None);
    assert_eq!(h.player.current_refresh_rate(), 60);
}

#[test]
fn test_disabled_sync_does_not_start() {
    let h = Harness::new();
    let sync = RefreshSync::new(&h.player, Arc::new(FixedDisplay::new(60)));

    sync.start().unwrap();
    assert!(!sync.is_running());
}

#[test]
fn test_periodic_sync_converges() {
    let h = playing(PlaybackConfig {
        refresh_check_interval: Duration::from_millis(10),
        ..PlaybackConfig::default().with_refresh_sync(true)
    });
    h.engine
        .set_property("container-fps", PropertyValue::Double(24.0));

    let sync = RefreshSync::new(&h.player, Arc::new(FixedDisplay::new(120)));
    sync.start().unwrap();
    sync.start().unwrap();
    assert!(sync.is_running());

    assert!(wait_until(|| h.player.current_refresh_rate() == 24));
    sync.stop();
    assert!(!sync.is_running());
    assert_eq!(h.engine.writes_of("display-fps-override"), vec!["24"]);
}
