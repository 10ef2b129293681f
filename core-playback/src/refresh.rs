//! # Display Refresh Sync
//!
//! Matches the engine's frame timing and the surface's vertical-sync target
//! to the content while playing.
//!
//! Every check, while the player is `Playing`:
//!
//! 1. If the content frame rate is known and differs from the display rate,
//!    tune to the content rate (avoids judder on 24/25 fps content).
//! 2. Otherwise, if the tuned rate drifted from the display rate, tune back
//!    to the display rate.

use crate::error::Result;
use crate::player::{Player, PlayerInner};
use crate::status::TimeControlStatus;
use bridge_traits::render::DisplayInfo;
use core_runtime::timer::RepeatingTimer;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info_span, Span};

pub struct RefreshSync {
    player: Weak<PlayerInner>,
    display: Arc<dyn DisplayInfo>,
    interval: Duration,
    enabled: bool,
    timer: Mutex<Option<RepeatingTimer>>,
    span: Span,
}

impl RefreshSync {
    pub fn new(player: &Player, display: Arc<dyn DisplayInfo>) -> Self {
        let inner = player.inner();
        let config = inner.config();
        Self {
            player: Arc::downgrade(inner),
            display,
            interval: config.refresh_check_interval,
            enabled: config.sync_display_refresh_rate,
            timer: Mutex::new(None),
            span: info_span!(parent: inner.span(), "refresh_sync"),
        }
    }

    /// Start periodic checks. A no-op unless display refresh sync is enabled
    /// in the player's configuration, or when already running.
    pub fn start(&self) -> Result<()> {
        if !self.enabled {
            debug!(parent: &self.span, "Display refresh sync disabled");
            return Ok(());
        }

        let mut timer = self.timer.lock();
        if timer.is_some() {
            return Ok(());
        }

        let player = self.player.clone();
        let display = Arc::clone(&self.display);
        let span = self.span.clone();
        *timer = Some(RepeatingTimer::start(
            "refresh-sync",
            self.interval,
            move || {
                if let Some(inner) = player.upgrade() {
                    check(&inner, display.as_ref(), &span);
                }
            },
        )?);
        debug!(parent: &self.span, interval_ms = self.interval.as_millis() as u64, "Display refresh sync started");
        Ok(())
    }

    pub fn stop(&self) {
        let stopped = self.timer.lock().take();
        if let Some(timer) = stopped {
            timer.stop();
            debug!(parent: &self.span, "Display refresh sync stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().as_ref().is_some_and(RepeatingTimer::is_running)
    }

    /// Run one check now. Returns the rate applied, if any.
    pub fn check_and_update(&self) -> Option<u32> {
        let inner = self.player.upgrade()?;
        check(&inner, self.display.as_ref(), &self.span)
    }
}

impl Drop for RefreshSync {
    fn drop(&mut self) {
        self.stop();
    }
}

fn check(inner: &PlayerInner, display: &dyn DisplayInfo, span: &Span) -> Option<u32> {
    if inner.time_control_status() != TimeControlStatus::Playing {
        return None;
    }

    let client = inner.client();
    let screen_rate = display.refresh_rate_or_default();
    let cached_rate = client.current_refresh_rate();
    let content_fps = inner.container_fps();

    let target = decide(content_fps, screen_rate, cached_rate)?;
    debug!(
        parent: span,
        content_fps,
        screen_rate,
        previous = cached_rate,
        target,
        "Adjusting refresh rate"
    );
    client.update_refresh_rate(target);
    Some(target)
}

/// The rate to apply, or `None` when the current tuning is right.
fn decide(content_fps: f64, screen_rate: u32, cached_rate: u32) -> Option<u32> {
    let content_rate = if content_fps.is_finite() && content_fps > 0.0 {
        content_fps.round() as u32
    } else {
        0
    };

    if content_rate > 0 && content_rate != screen_rate {
        return (content_rate != cached_rate).then_some(content_rate);
    }
    (cached_rate != screen_rate).then_some(screen_rate)
}
