//! # Player
//!
//! The public playback facade.
//!
//! ## Overview
//!
//! A [`Player`] owns an [`EngineClient`], the [`EventPump`] draining its
//! events, a [`TrackRegistry`] and a [`TimeObserverHub`]. Hosts call the
//! transport, seek and selection methods from any thread; the player turns
//! engine events into published state:
//!
//! - Published state (current item, discovered tracks, selection, time-control
//!   status) only changes inside jobs running on the main dispatcher. Events
//!   discovered on the pump thread are handed over before touching it.
//! - `TimeControlStatus` is recomputed from `intends_to_play` and
//!   `paused_for_cache`, which only change in response to engine events.
//! - Loads register a one-shot continuation that runs when the engine reports
//!   the file as opened. A newer load supersedes it (its completion receives
//!   `false`); a track-switch reload that never opens expires after
//!   [`PlaybackConfig::load_timeout`]. Initial loads wait for the engine,
//!   however slow the stream is to open.
//! - Every command-issuing method takes an optional [`Completion`], invoked
//!   exactly once on the main dispatcher.
//!
//! ## Track selection
//!
//! Embedded tracks are switched in place by writing `aid`/`sid`. Sideloaded
//! assets can only be selected by reloading the file with the asset attached;
//! the playback position and the other active sideloaded track are preserved
//! across the reload.

use crate::client::{status_completion, Completion, EngineClient, SeekTarget};
use crate::config::{PlaybackConfig, PlayerConfig};
use crate::error::{PlaybackError, Result};
use crate::events::PlayerEvent;
use crate::item::{AudioAsset, PlayerItem, Subtitle};
use crate::metrics::PlaybackMetrics;
use crate::observers::{ObserverToken, TimeObserverHub, TimeSampler};
use crate::options::{resolve_startup_options, surface_gpu_api};
use crate::pump::{EngineEventHandler, EventPump};
use crate::status::{seconds, PlaybackTime, TimeControlStatus};
use crate::tracks::{first_of_kind, DiscoveredTrack, Resolution, TrackKind, TrackRegistry};
use bridge_traits::dispatch::Dispatcher;
use bridge_traits::engine::{EndFileReason, EngineEvent, PropertyValue};
use bridge_traits::logging::LogLevel;
use bridge_traits::render::RenderSurface;
use core_runtime::events::{EventBus, EventStream};
use core_runtime::logging::strip_path;
use core_runtime::timer::Timeout;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, info_span, trace, warn, Span};

/// Subtitle id that disables subtitles.
pub const DISABLE_SUBTITLES: &str = "none";

/// The engine's own spelling of [`DISABLE_SUBTITLES`], accepted as well.
const ENGINE_NO_TRACK: &str = "no";

/// Container frame rate reported while no engine is available.
const FALLBACK_CONTAINER_FPS: f64 = 30.0;

// ============================================================================
// Published state
// ============================================================================

#[derive(Debug, Default)]
struct PlayerState {
    current_item: Option<PlayerItem>,
    discovered_tracks: Vec<DiscoveredTrack>,
    current_audio_track_id: Option<String>,
    current_subtitle_id: Option<String>,
    intends_to_play: bool,
    paused_for_cache: bool,
    time_control_status: TimeControlStatus,
    player_size: Option<(f64, f64)>,
    /// Set once end-of-media was signalled for the current run.
    reached_end: bool,
}

// ============================================================================
// Pending loads
// ============================================================================

/// What to do once the engine reports the loaded file as opened.
enum LoadContinuation {
    InitialLoad {
        autoplay: bool,
        completion: Option<Completion>,
    },
    AudioSwitch {
        asset: AudioAsset,
        completion: Option<Completion>,
    },
    SubtitleSwitch {
        subtitle: Subtitle,
        completion: Option<Completion>,
    },
}

impl LoadContinuation {
    fn name(&self) -> &'static str {
        match self {
            LoadContinuation::InitialLoad { .. } => "initial-load",
            LoadContinuation::AudioSwitch { .. } => "audio-switch",
            LoadContinuation::SubtitleSwitch { .. } => "subtitle-switch",
        }
    }

    /// Track switches give up after the load timeout; initial loads do not.
    fn expires(&self) -> bool {
        !matches!(self, LoadContinuation::InitialLoad { .. })
    }

    /// Report failure to whoever is waiting on this continuation.
    fn abandon(self) {
        match self {
            LoadContinuation::InitialLoad { completion, .. }
            | LoadContinuation::AudioSwitch { completion, .. }
            | LoadContinuation::SubtitleSwitch { completion, .. } => complete(completion, false),
        }
    }
}

enum PendingLoad {
    Idle,
    AwaitingLoad {
        generation: u64,
        continuation: LoadContinuation,
        timeout: Option<Timeout>,
    },
}

fn complete(completion: Option<Completion>, success: bool) {
    if let Some(completion) = completion {
        completion(success);
    }
}

// ============================================================================
// Player
// ============================================================================

/// Observable playback controller over a native media engine.
pub struct Player {
    inner: Arc<PlayerInner>,
    pump: EventPump,
}

pub(crate) struct PlayerInner {
    me: Weak<PlayerInner>,
    client: Arc<EngineClient>,
    registry: TrackRegistry,
    dispatcher: Arc<dyn Dispatcher>,
    config: PlaybackConfig,
    state: RwLock<PlayerState>,
    pending: Mutex<PendingLoad>,
    generation: AtomicU64,
    events: EventBus<PlayerEvent>,
    observers: TimeObserverHub,
    span: Span,
}

impl Player {
    /// Create a player, terminating the process if the engine cannot be
    /// created. Use [`Player::try_new`] to handle the error instead.
    pub fn new(config: PlayerConfig) -> Self {
        match Self::try_new(config) {
            Ok(player) => player,
            Err(err) => {
                error!(error = %err, "Failed to create media engine");
                std::process::exit(1);
            }
        }
    }

    pub fn try_new(config: PlayerConfig) -> Result<Self> {
        let PlayerConfig {
            engine_factory,
            runtime,
            playback,
            span,
        } = config;
        playback.validate()?;

        let dispatcher = Arc::clone(&runtime.main_dispatcher);
        let options = resolve_startup_options(&playback, num_cpus::get());
        let client = Arc::new(EngineClient::create(
            engine_factory.as_ref(),
            &options,
            Arc::clone(&dispatcher),
            playback.default_refresh_rate,
            info_span!(parent: &span, "engine"),
        )?);

        let inner = Arc::new_cyclic(|me: &Weak<PlayerInner>| {
            let sampled = me.clone();
            let sampler: TimeSampler =
                Arc::new(move || sampled.upgrade().map(|inner| inner.playback_time()));

            PlayerInner {
                me: me.clone(),
                registry: TrackRegistry::new(Arc::clone(&client)),
                client: Arc::clone(&client),
                dispatcher,
                events: EventBus::new(playback.event_channel_capacity),
                observers: TimeObserverHub::new(
                    sampler,
                    info_span!(parent: &span, "time_observers"),
                ),
                config: playback,
                state: RwLock::new(PlayerState::default()),
                pending: Mutex::new(PendingLoad::Idle),
                generation: AtomicU64::new(0),
                span: span.clone(),
            }
        });

        let weak: Weak<PlayerInner> = Arc::downgrade(&inner);
        let handler: Weak<dyn EngineEventHandler> = weak;
        let pump = EventPump::start(client, handler, info_span!(parent: &span, "event_pump"))?;

        info!(parent: &span, "Player created");
        Ok(Self { inner, pump })
    }

    pub(crate) fn inner(&self) -> &Arc<PlayerInner> {
        &self.inner
    }

    /// Subscribe to player notifications.
    pub fn subscribe(&self) -> EventStream<PlayerEvent> {
        self.inner.events.subscribe()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Replace the current item and load it.
    ///
    /// Selection and discovered tracks are cleared before the load is issued.
    /// Once the file is opened, the tracks are discovered, the first audio
    /// and subtitle tracks are selected and, with `autoplay`, playback starts.
    /// `completion` receives `true` at that point, or `false` when the load
    /// is rejected, superseded or stopped.
    pub fn replace_current_item(
        &self,
        item: PlayerItem,
        autoplay: bool,
        completion: Option<Completion>,
    ) {
        self.inner
            .on_main(move |inner| inner.replace_item(item, autoplay, completion));
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Request playback. `completion` receives the engine's reply to the
    /// `pause` write; the status follows the resulting property change.
    pub fn play(&self, completion: Option<Completion>) {
        self.inner.play(completion);
    }

    pub fn pause(&self, completion: Option<Completion>) {
        self.inner
            .client
            .set_flag_async("pause", true, status_completion(completion));
    }

    pub fn toggle_play(&self, completion: Option<Completion>) {
        self.inner.on_main(move |inner| {
            inner
                .client
                .command(&["cycle", "pause"], true, status_completion(completion));
        });
    }

    /// Stop playback. Abandons any load still waiting for its file.
    pub fn stop(&self, completion: Option<Completion>) {
        self.inner.on_main(move |inner| {
            inner.cancel_pending_load("stopped");
            inner
                .client
                .command(&["stop"], true, status_completion(completion));
        });
    }

    // ========================================================================
    // Seeking
    // ========================================================================

    /// Seek to `position`. Dropped (completion `false`) while another seek is
    /// in flight.
    pub fn seek_to(&self, position: Duration, completion: Option<Completion>) {
        self.inner
            .client
            .seek(SeekTarget::Absolute(position.as_secs_f64()), completion);
    }

    /// Seek by `offset_seconds` from the current position.
    pub fn seek_relative(&self, offset_seconds: f64, completion: Option<Completion>) {
        self.inner
            .client
            .seek(SeekTarget::Relative(offset_seconds), completion);
    }

    /// Seek to a fraction (`0.0..=1.0`) of the duration. A no-op reporting
    /// `false` while the duration is unknown.
    pub fn seek_to_progress(&self, progress: f64, completion: Option<Completion>) {
        let duration = self.inner.client.get_double("duration");
        if !(duration.is_finite() && duration > 0.0) || !progress.is_finite() {
            debug!(
                parent: &self.inner.span,
                duration,
                progress,
                "Progress seek without a known duration"
            );
            complete(completion, false);
            return;
        }
        let target = progress.clamp(0.0, 1.0) * duration;
        self.inner.client.seek(SeekTarget::Absolute(target), completion);
    }

    // ========================================================================
    // Track selection
    // ========================================================================

    /// Select an audio track by embedded track id or sideloaded asset id.
    pub fn select_audio_track(&self, id: impl Into<String>, completion: Option<Completion>) {
        let id = id.into();
        self.inner
            .on_main(move |inner| inner.select_audio(&id, completion));
    }

    /// Select a subtitle by embedded track id or sideloaded subtitle id.
    /// `None` or [`DISABLE_SUBTITLES`] removes all subtitles.
    pub fn select_subtitle(&self, id: Option<String>, completion: Option<Completion>) {
        self.inner
            .on_main(move |inner| inner.select_subtitle(id.as_deref(), completion));
    }

    /// Attach an external subtitle file and rediscover the tracks.
    pub fn add_external_subtitle(&self, url: impl Into<String>, completion: Option<Completion>) {
        let url = url.into();
        self.inner.on_main(move |inner| {
            let status = inner.client.command(&["sub-add", &url], true, None);
            if status >= 0 {
                inner.refresh_tracks();
            }
            complete(completion, status >= 0);
        });
    }

    /// Attach an external video track.
    pub fn add_video_track(&self, url: impl Into<String>, completion: Option<Completion>) {
        let url = url.into();
        self.inner.on_main(move |inner| {
            inner
                .client
                .command(&["video-add", &url], true, status_completion(completion));
        });
    }

    pub fn has_subtitle_tracks(&self) -> bool {
        self.inner.registry.has_subtitle_tracks()
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.inner
            .client
            .set_string("video", if enabled { "1" } else { "no" });
    }

    pub fn set_subtitles_visible(&self, visible: bool) {
        self.inner
            .client
            .set_string("sub", if visible { "auto" } else { "no" });
    }

    pub fn set_subtitle_scale(&self, scale: f64) {
        self.inner.client.set_string("sub-scale", &scale.to_string());
    }

    /// Set the subtitle color, e.g. `#FFFF00`.
    pub fn set_subtitle_color(&self, color: &str) {
        self.inner.client.set_string("sub-color", color);
    }

    // ========================================================================
    // Rate
    // ========================================================================

    /// Current playback rate. `1.0` while no engine is available.
    pub fn rate(&self) -> f64 {
        if !self.inner.client.is_alive() {
            return 1.0;
        }
        self.inner.client.get_double("speed")
    }

    /// Set the playback rate. Non-positive or non-finite rates are ignored
    /// and report `false`.
    pub fn set_rate(&self, rate: f64, completion: Option<Completion>) {
        if !(rate.is_finite() && rate > 0.0) {
            warn!(parent: &self.inner.span, rate, "Ignoring invalid playback rate");
            self.inner.on_main(move |_| complete(completion, false));
            return;
        }
        self.inner
            .client
            .set_double_async("speed", rate, status_completion(completion));
    }

    // ========================================================================
    // Rendering surface
    // ========================================================================

    /// Create the render context and bind `surface` to it.
    pub fn try_attach_render_surface(&self, surface: Arc<dyn RenderSurface>) -> Result<()> {
        let client = &self.inner.client;
        client.create_render_context()?;
        client.set_option("gpu-api", &surface_gpu_api(&self.inner.config));
        client.attach_surface(Arc::clone(&surface));
        let size = self.inner.state.read().player_size;
        if let Some((width, height)) = size {
            surface.set_size(width, height);
        }
        debug!(parent: &self.inner.span, "Render surface attached");
        Ok(())
    }

    /// Like [`Player::try_attach_render_surface`], terminating the process
    /// when no render context can be created.
    pub fn attach_render_surface(&self, surface: Arc<dyn RenderSurface>) {
        if let Err(err) = self.try_attach_render_surface(surface) {
            error!(parent: &self.inner.span, error = %err, "Failed to initialize rendering");
            std::process::exit(1);
        }
    }

    /// Publish the player size and resize the surface. Non-positive sizes are
    /// ignored.
    pub fn set_size(&self, width: f64, height: f64) {
        if !(width > 0.0 && height > 0.0) {
            return;
        }
        self.inner.on_main(move |inner| {
            inner.state.write().player_size = Some((width, height));
            inner.client.set_size(width, height);
        });
    }

    pub fn request_redraw(&self) -> bool {
        self.inner.client.request_redraw()
    }

    // ========================================================================
    // Time observation
    // ========================================================================

    /// Call `callback` every `interval` with the current playback time, on
    /// `dispatcher` or the main dispatcher.
    pub fn add_periodic_time_observer<F>(
        &self,
        interval: Duration,
        dispatcher: Option<Arc<dyn Dispatcher>>,
        callback: F,
    ) -> Result<ObserverToken>
    where
        F: Fn(PlaybackTime) + Send + Sync + 'static,
    {
        let dispatcher = dispatcher.unwrap_or_else(|| Arc::clone(&self.inner.dispatcher));
        self.inner
            .observers
            .add(interval, dispatcher, Arc::new(callback))
    }

    pub fn remove_time_observer(&self, token: ObserverToken) -> bool {
        self.inner.observers.remove(token)
    }

    // ========================================================================
    // Published state
    // ========================================================================

    pub fn current_item(&self) -> Option<PlayerItem> {
        self.inner.state.read().current_item.clone()
    }

    pub fn discovered_tracks(&self) -> Vec<DiscoveredTrack> {
        self.inner.state.read().discovered_tracks.clone()
    }

    pub fn current_audio_track_id(&self) -> Option<String> {
        self.inner.state.read().current_audio_track_id.clone()
    }

    pub fn current_subtitle_id(&self) -> Option<String> {
        self.inner.state.read().current_subtitle_id.clone()
    }

    pub fn time_control_status(&self) -> TimeControlStatus {
        self.inner.time_control_status()
    }

    pub fn intends_to_play(&self) -> bool {
        self.inner.state.read().intends_to_play
    }

    pub fn is_paused_for_cache(&self) -> bool {
        self.inner.state.read().paused_for_cache
    }

    pub fn player_size(&self) -> Option<(f64, f64)> {
        self.inner.state.read().player_size
    }

    // ========================================================================
    // Live engine reads
    // ========================================================================

    pub fn current_time(&self) -> Duration {
        seconds(self.inner.client.get_double("time-pos"))
    }

    pub fn duration(&self) -> Duration {
        seconds(self.inner.client.get_double("duration"))
    }

    pub fn playback_time(&self) -> PlaybackTime {
        self.inner.playback_time()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.client.get_flag("eof-reached")
    }

    pub fn aspect_ratio(&self) -> f64 {
        positive_or(
            self.inner.client.get_double("video-params/aspect"),
            self.inner.config.default_aspect_ratio,
        )
    }

    pub fn video_display_height(&self) -> f64 {
        positive_or(
            self.inner.client.get_double("video-params/dh"),
            self.inner.config.default_display_height,
        )
    }

    pub fn container_fps(&self) -> f64 {
        self.inner.container_fps()
    }

    /// Diagnostics snapshot. `None` while no item is loaded.
    pub fn metrics(&self) -> Option<PlaybackMetrics> {
        if self.inner.state.read().current_item.is_none() || !self.inner.client.is_alive() {
            return None;
        }
        Some(PlaybackMetrics::collect(&self.inner.client))
    }

    /// Frame rate the engine and surface are currently tuned to.
    pub fn current_refresh_rate(&self) -> u32 {
        self.inner.client.current_refresh_rate()
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Stop observers and the event pump and destroy the engine. Idempotent.
    pub fn shutdown(&self) {
        self.inner.observers.stop();
        self.pump.stop();
        self.inner.cancel_pending_load("shutdown");
        self.inner.client.destroy();
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

// ============================================================================
// Inner state machine
// ============================================================================

impl PlayerInner {
    /// Run `job` on the main dispatcher.
    fn on_main<F>(&self, job: F)
    where
        F: FnOnce(&PlayerInner) + Send + 'static,
    {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        self.dispatcher.dispatch(Box::new(move || job(&me)));
    }

    fn emit(&self, event: PlayerEvent) {
        trace!(parent: &self.span, event = event.name(), "Publishing event");
        let _ = self.events.emit(event);
    }

    pub(crate) fn client(&self) -> &Arc<EngineClient> {
        &self.client
    }

    pub(crate) fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    pub(crate) fn time_control_status(&self) -> TimeControlStatus {
        self.state.read().time_control_status
    }

    pub(crate) fn container_fps(&self) -> f64 {
        if !self.client.is_alive() {
            return FALLBACK_CONTAINER_FPS;
        }
        self.client.get_double("container-fps")
    }

    fn playback_time(&self) -> PlaybackTime {
        PlaybackTime {
            current: seconds(self.client.get_double("time-pos")),
            duration: seconds(self.client.get_double("duration")),
            status: self.time_control_status(),
        }
    }

    fn play(&self, completion: Option<Completion>) {
        self.client
            .set_flag_async("pause", false, status_completion(completion));
    }

    /// Apply `update` to the status inputs and publish the derived status if
    /// it changed.
    fn update_inputs(&self, update: impl FnOnce(&mut PlayerState)) {
        let changed = {
            let mut state = self.state.write();
            update(&mut state);
            let status =
                TimeControlStatus::from_inputs(state.intends_to_play, state.paused_for_cache);
            if status != state.time_control_status {
                state.time_control_status = status;
                Some(status)
            } else {
                None
            }
        };

        if let Some(status) = changed {
            debug!(parent: &self.span, ?status, "Time control status changed");
            self.emit(PlayerEvent::TimeControlStatusChanged { status });
        }
    }

    fn reach_end(&self) {
        let first = {
            let mut state = self.state.write();
            let first = !state.reached_end && state.current_item.is_some();
            state.reached_end = true;
            first
        };
        if first {
            info!(parent: &self.span, "Played to end");
            self.emit(PlayerEvent::DidPlayToEndTime);
        }
    }

    // ------------------------------------------------------------------------
    // Loads
    // ------------------------------------------------------------------------

    fn replace_item(&self, item: PlayerItem, autoplay: bool, completion: Option<Completion>) {
        let had_item = {
            let mut state = self.state.write();
            let had_item = state.current_item.is_some();
            state.current_item = Some(item.clone());
            state.discovered_tracks.clear();
            state.current_audio_track_id = None;
            state.current_subtitle_id = None;
            state.reached_end = false;
            had_item
        };
        // The status follows the engine's end-file and pause notifications.
        if had_item {
            self.client.command(&["stop"], true, None);
        }

        info!(
            parent: &self.span,
            file = %strip_path(item.url()),
            kind = ?item.kind(),
            autoplay,
            "Replacing current item"
        );
        self.emit(PlayerEvent::ItemReplaced {
            url: item.url().to_string(),
            kind: item.kind(),
        });

        let generation = self.await_load(LoadContinuation::InitialLoad {
            autoplay,
            completion,
        });
        self.load(&item, None, None, None, generation);
    }

    /// Issue `loadfile`; a rejected load fails its pending continuation.
    fn load(
        &self,
        item: &PlayerItem,
        audio_url: Option<&str>,
        subtitle_url: Option<&str>,
        start: Option<f64>,
        generation: u64,
    ) {
        let me = self.me.clone();
        self.client.load_file(
            item.url(),
            audio_url,
            subtitle_url,
            start,
            false,
            Some(Box::new(move |status| {
                if status < 0 {
                    if let Some(inner) = me.upgrade() {
                        inner.fail_load(generation, "engine rejected the load");
                    }
                }
            })),
        );
    }

    /// Register `continuation` for the next file-loaded event, superseding
    /// any continuation still waiting.
    fn await_load(&self, continuation: LoadContinuation) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let timeout = if continuation.expires() {
            self.arm_load_timeout(generation)
        } else {
            None
        };

        trace!(parent: &self.span, generation, continuation = continuation.name(), "Awaiting file load");
        let previous = std::mem::replace(
            &mut *self.pending.lock(),
            PendingLoad::AwaitingLoad {
                generation,
                continuation,
                timeout,
            },
        );

        if let PendingLoad::AwaitingLoad {
            generation: superseded,
            continuation,
            timeout,
        } = previous
        {
            drop(timeout);
            debug!(
                parent: &self.span,
                generation = superseded,
                continuation = continuation.name(),
                "Pending load superseded"
            );
            continuation.abandon();
        }

        generation
    }

    fn arm_load_timeout(&self, generation: u64) -> Option<Timeout> {
        let me = self.me.clone();
        match Timeout::start(
            format!("load-timeout-{generation}"),
            self.config.load_timeout,
            move || {
                if let Some(inner) = me.upgrade() {
                    inner.on_main(move |inner| inner.expire_load(generation));
                }
            },
        ) {
            Ok(timeout) => Some(timeout),
            Err(err) => {
                warn!(parent: &self.span, error = %err, "Load watchdog unavailable");
                None
            }
        }
    }

    /// Take the pending continuation if it still belongs to `generation`.
    fn take_pending(&self, generation: u64) -> Option<(LoadContinuation, Option<Timeout>)> {
        let mut pending = self.pending.lock();
        match &*pending {
            PendingLoad::AwaitingLoad { generation: current, .. } if *current == generation => {}
            _ => return None,
        }
        match std::mem::replace(&mut *pending, PendingLoad::Idle) {
            PendingLoad::AwaitingLoad {
                continuation,
                timeout,
                ..
            } => Some((continuation, timeout)),
            PendingLoad::Idle => None,
        }
    }

    fn fail_load(&self, generation: u64, reason: &str) {
        let Some((continuation, timeout)) = self.take_pending(generation) else {
            return;
        };
        drop(timeout);
        warn!(
            parent: &self.span,
            generation,
            continuation = continuation.name(),
            reason,
            "Load failed"
        );
        continuation.abandon();
    }

    fn expire_load(&self, generation: u64) {
        let Some((continuation, timeout)) = self.take_pending(generation) else {
            return;
        };
        drop(timeout);
        warn!(
            parent: &self.span,
            generation,
            continuation = continuation.name(),
            error = %PlaybackError::LoadTimedOut { generation },
            "Giving up on pending load"
        );
        continuation.abandon();
        self.emit(PlayerEvent::LoadTimedOut { generation });
    }

    fn cancel_pending_load(&self, reason: &str) {
        let previous = std::mem::replace(&mut *self.pending.lock(), PendingLoad::Idle);
        if let PendingLoad::AwaitingLoad {
            generation,
            continuation,
            timeout,
        } = previous
        {
            drop(timeout);
            debug!(parent: &self.span, generation, reason, "Pending load cancelled");
            continuation.abandon();
        }
    }

    fn file_loaded(&self) {
        let pending = std::mem::replace(&mut *self.pending.lock(), PendingLoad::Idle);
        self.emit(PlayerEvent::FileLoaded);

        match pending {
            PendingLoad::Idle => {
                trace!(parent: &self.span, "File loaded without a pending continuation");
            }
            PendingLoad::AwaitingLoad {
                generation,
                continuation,
                timeout,
            } => {
                drop(timeout);
                debug!(
                    parent: &self.span,
                    generation,
                    continuation = continuation.name(),
                    "File loaded"
                );
                self.run_continuation(continuation);
            }
        }
    }

    fn run_continuation(&self, continuation: LoadContinuation) {
        match continuation {
            LoadContinuation::InitialLoad {
                autoplay,
                completion,
            } => {
                let tracks = self.refresh_tracks();
                if let Some(track) = first_of_kind(&tracks, TrackKind::Audio) {
                    self.select_audio(&track.id, None);
                }
                if let Some(track) = first_of_kind(&tracks, TrackKind::Subtitle) {
                    self.select_subtitle(Some(&track.id), None);
                }
                if autoplay {
                    self.play(None);
                }
                complete(completion, true);
            }
            LoadContinuation::AudioSwitch { asset, completion } => {
                let tracks = self.refresh_tracks();
                self.reapply_embedded_subtitle(&tracks);
                self.state.write().current_audio_track_id = Some(asset.id.clone());
                info!(parent: &self.span, label = %asset.label, "Sideloaded audio active");
                self.emit(PlayerEvent::AudioTrackChanged { id: Some(asset.id) });
                complete(completion, true);
                self.play(None);
            }
            LoadContinuation::SubtitleSwitch {
                subtitle,
                completion,
            } => {
                let tracks = self.refresh_tracks();
                self.reapply_embedded_audio(&tracks);
                self.state.write().current_subtitle_id = Some(subtitle.id.clone());
                info!(parent: &self.span, label = %subtitle.label, "Sideloaded subtitle active");
                self.emit(PlayerEvent::SubtitleChanged {
                    id: Some(subtitle.id),
                });
                complete(completion, true);
                self.play(None);
            }
        }
    }

    /// Recompute the discovered track snapshot and publish it.
    fn refresh_tracks(&self) -> Vec<DiscoveredTrack> {
        let tracks = self.registry.fetch();
        self.state.write().discovered_tracks = tracks.clone();
        debug!(parent: &self.span, count = tracks.len(), "Tracks discovered");
        self.emit(PlayerEvent::TracksChanged {
            tracks: tracks.clone(),
        });
        tracks
    }

    /// After a reload, re-select the embedded subtitle that was active.
    fn reapply_embedded_subtitle(&self, tracks: &[DiscoveredTrack]) {
        let current = self.state.read().current_subtitle_id.clone();
        if let Some(id) = current {
            if tracks
                .iter()
                .any(|t| t.kind == TrackKind::Subtitle && t.id == id)
            {
                self.client.set_string("sid", &id);
            }
        }
    }

    /// After a reload, re-select the embedded audio track that was active.
    fn reapply_embedded_audio(&self, tracks: &[DiscoveredTrack]) {
        let current = self.state.read().current_audio_track_id.clone();
        if let Some(id) = current {
            if tracks.iter().any(|t| t.kind == TrackKind::Audio && t.id == id) {
                self.client.set_string("aid", &id);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    fn selection_context(&self) -> (Option<PlayerItem>, Vec<DiscoveredTrack>) {
        let state = self.state.read();
        (state.current_item.clone(), state.discovered_tracks.clone())
    }

    fn select_audio(&self, id: &str, completion: Option<Completion>) {
        let (item, discovered) = self.selection_context();
        let Some(item) = item else {
            warn!(parent: &self.span, id, error = %PlaybackError::NoItemLoaded, "Audio selection rejected");
            complete(completion, false);
            return;
        };

        match TrackRegistry::resolve_audio(id, &discovered, &item) {
            Resolution::Embedded(id) => {
                if self.client.set_string("aid", &id) < 0 {
                    complete(completion, false);
                    return;
                }
                self.state.write().current_audio_track_id = Some(id.clone());
                debug!(parent: &self.span, id = %id, "Switched to embedded audio track");
                self.emit(PlayerEvent::AudioTrackChanged { id: Some(id) });
                complete(completion, true);
            }
            Resolution::Sideloaded(asset) if item.is_video() => {
                let position = self.client.get_double("time-pos");
                let subtitle_url = self.sideloaded_subtitle_url(&item);
                info!(
                    parent: &self.span,
                    label = %asset.label,
                    position,
                    "Switching to sideloaded audio by reloading"
                );
                let audio_url = asset.url.clone();
                let generation = self.await_load(LoadContinuation::AudioSwitch { asset, completion });
                self.load(
                    &item,
                    Some(&audio_url),
                    subtitle_url.as_deref(),
                    Some(position),
                    generation,
                );
            }
            Resolution::Sideloaded(_) => {
                let err = PlaybackError::UnsupportedForAsset {
                    operation: "Sideloaded audio selection",
                    kind: item.kind(),
                };
                warn!(parent: &self.span, id, error = %err, "Audio selection rejected");
                complete(completion, false);
            }
            Resolution::NotFound => {
                warn!(
                    parent: &self.span,
                    error = %PlaybackError::TrackNotFound(id.to_string()),
                    "Audio selection rejected"
                );
                complete(completion, false);
            }
        }
    }

    fn select_subtitle(&self, id: Option<&str>, completion: Option<Completion>) {
        let (item, discovered) = self.selection_context();
        let Some(item) = item else {
            warn!(parent: &self.span, error = %PlaybackError::NoItemLoaded, "Subtitle selection rejected");
            complete(completion, false);
            return;
        };
        if !item.is_video() {
            let err = PlaybackError::UnsupportedForAsset {
                operation: "Subtitle selection",
                kind: item.kind(),
            };
            warn!(parent: &self.span, error = %err, "Subtitle selection ignored");
            complete(completion, false);
            return;
        }

        let disabled = |id: &&str| matches!(*id, DISABLE_SUBTITLES | ENGINE_NO_TRACK);
        let Some(id) = id.filter(|id| !disabled(id)) else {
            self.client.command(&["sub-remove"], false, None);
            self.state.write().current_subtitle_id = None;
            debug!(parent: &self.span, "Subtitles removed");
            self.emit(PlayerEvent::SubtitleChanged { id: None });
            complete(completion, true);
            return;
        };

        match TrackRegistry::resolve_subtitle(id, &discovered, &item) {
            Resolution::Embedded(id) => {
                if self.client.set_string("sid", &id) < 0 {
                    complete(completion, false);
                    return;
                }
                self.state.write().current_subtitle_id = Some(id.clone());
                debug!(parent: &self.span, id = %id, "Switched to embedded subtitle");
                self.emit(PlayerEvent::SubtitleChanged { id: Some(id) });
                complete(completion, true);
            }
            Resolution::Sideloaded(subtitle) => {
                let position = self.client.get_double("time-pos");
                let audio_url = self.sideloaded_audio_url(&item);
                info!(
                    parent: &self.span,
                    label = %subtitle.label,
                    position,
                    "Switching to sideloaded subtitle by reloading"
                );
                let subtitle_url = subtitle.url.clone();
                let generation = self.await_load(LoadContinuation::SubtitleSwitch {
                    subtitle,
                    completion,
                });
                self.load(
                    &item,
                    audio_url.as_deref(),
                    Some(&subtitle_url),
                    Some(position),
                    generation,
                );
            }
            Resolution::NotFound => {
                warn!(
                    parent: &self.span,
                    error = %PlaybackError::TrackNotFound(id.to_string()),
                    "Subtitle selection rejected"
                );
                complete(completion, false);
            }
        }
    }

    /// URL of the active subtitle if it is a sideloaded one.
    fn sideloaded_subtitle_url(&self, item: &PlayerItem) -> Option<String> {
        let current = self.state.read().current_subtitle_id.clone()?;
        item.subtitle(&current).map(|subtitle| subtitle.url.clone())
    }

    /// URL of the active audio track if it is a sideloaded one.
    fn sideloaded_audio_url(&self, item: &PlayerItem) -> Option<String> {
        let current = self.state.read().current_audio_track_id.clone()?;
        item.audio_asset(&current).map(|asset| asset.url.clone())
    }

    // ------------------------------------------------------------------------
    // Property changes
    // ------------------------------------------------------------------------

    fn property_changed(&self, name: &str, value: &PropertyValue) {
        let Some(flag) = value.as_flag() else {
            trace!(parent: &self.span, property = name, "Ignoring non-flag property change");
            return;
        };

        match name {
            "pause" => self.update_inputs(|state| state.intends_to_play = !flag),
            "core-idle" => {
                if !flag {
                    self.update_inputs(|state| state.intends_to_play = true);
                }
            }
            "paused-for-cache" => self.update_inputs(|state| state.paused_for_cache = flag),
            "eof-reached" => {
                if flag {
                    self.reach_end();
                }
            }
            _ => trace!(parent: &self.span, property = name, "Unhandled property change"),
        }
    }
}

impl EngineEventHandler for PlayerInner {
    fn handle_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::FileLoaded => self.on_main(|inner| inner.file_loaded()),
            EngineEvent::PlaybackRestart => self.on_main(|inner| {
                inner.update_inputs(|state| {
                    state.intends_to_play = true;
                    state.reached_end = false;
                })
            }),
            EngineEvent::PropertyChange { name, value } => {
                self.on_main(move |inner| inner.property_changed(&name, &value))
            }
            EngineEvent::EndFile { reason } => self.on_main(move |inner| {
                inner.update_inputs(|state| state.intends_to_play = false);
                if reason == EndFileReason::Eof {
                    inner.reach_end();
                } else {
                    debug!(parent: &inner.span, ?reason, "File ended");
                }
            }),
            EngineEvent::CommandReply { userdata, error }
            | EngineEvent::SetPropertyReply { userdata, error } => {
                self.client.complete_reply(userdata, error)
            }
            EngineEvent::LogMessage {
                prefix,
                level,
                text,
            } => forward_engine_log(&self.span, &prefix, &level, &text),
            EngineEvent::Shutdown => {
                self.client.handle_shutdown();
                self.on_main(|inner| inner.update_inputs(|state| state.intends_to_play = false));
            }
            EngineEvent::None | EngineEvent::Other(_) => {}
        }
    }
}

/// Relay an engine log line under the `engine` target at its own level.
fn forward_engine_log(span: &Span, prefix: &str, level: &str, text: &str) {
    let text = text.trim_end();
    match LogLevel::from_engine_level(level) {
        LogLevel::Error => error!(target: "engine", parent: span, prefix, "{}", text),
        LogLevel::Warn => warn!(target: "engine", parent: span, prefix, "{}", text),
        LogLevel::Info => info!(target: "engine", parent: span, prefix, "{}", text),
        LogLevel::Debug => debug!(target: "engine", parent: span, prefix, "{}", text),
        LogLevel::Trace => trace!(target: "engine", parent: span, prefix, "{}", text),
    }
}
