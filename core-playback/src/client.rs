//! # Engine Client
//!
//! Owns the native [`MediaEngine`] handle and exposes it as a safe, typed API.
//!
//! ## Overview
//!
//! - Startup: options from the option table, log level, `initialize`, then the
//!   fixed property observations the player state machine depends on.
//! - Commands: synchronous ones report their status inline; asynchronous ones
//!   register a reply callback keyed by a userdata value, resolved when the
//!   matching reply event is drained.
//! - Property accessors degrade to defaults (0, `false`, `None`) once the
//!   engine is gone, so callers never need to check for it.
//! - At most one seek is in flight; further seeks are dropped until the
//!   pending seek's reply arrives.
//!
//! The handle is an `Option` behind a lock: `destroy` and the engine's own
//! shutdown event both clear it, after which every call is a safe no-op.

use crate::error::{PlaybackError, Result};
use bridge_traits::dispatch::Dispatcher;
use bridge_traits::engine::{
    EngineEvent, EngineFactory, MediaEngine, PropertyFormat, PropertyValue, WakeupCallback,
    ENGINE_UNINITIALIZED,
};
use bridge_traits::render::RenderSurface;
use core_runtime::logging::redact_if_sensitive;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn, Span};

/// Callback receiving a native status code (`>= 0` is success).
pub type StatusCallback = Box<dyn FnOnce(i32) + Send + 'static>;

/// Callback receiving a success flag. Invoked exactly once.
pub type Completion = Box<dyn FnOnce(bool) + Send + 'static>;

/// Adapt a [`Completion`] to receive a native status.
pub fn status_completion(completion: Option<Completion>) -> Option<StatusCallback> {
    completion.map(|completion| {
        Box::new(move |status: i32| completion(status >= 0)) as StatusCallback
    })
}

/// Boolean properties observed for the lifetime of the engine.
pub const OBSERVED_FLAGS: &[&str] = &["pause", "core-idle", "paused-for-cache", "eof-reached"];

/// Minimum spacing between redraw requests forwarded to the surface.
const REDRAW_COOLDOWN: Duration = Duration::from_millis(100);

/// Where a seek should land.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Seconds from the start of the media.
    Absolute(f64),
    /// Seconds relative to the current position.
    Relative(f64),
}

/// Typed, thread-safe wrapper around the native engine.
pub struct EngineClient {
    engine: RwLock<Option<Arc<dyn MediaEngine>>>,
    surface: RwLock<Option<Arc<dyn RenderSurface>>>,
    render_context: AtomicBool,
    seeking: Arc<AtomicBool>,
    next_userdata: AtomicU64,
    replies: Mutex<HashMap<u64, StatusCallback>>,
    /// Context on which async replies are delivered.
    dispatcher: Arc<dyn Dispatcher>,
    refresh_rate: AtomicU32,
    last_redraw: Mutex<Option<Instant>>,
    span: Span,
}

impl EngineClient {
    /// Allocate, configure and initialize a native engine.
    ///
    /// `options` are applied in order before initialization.
    pub fn create(
        factory: &dyn EngineFactory,
        options: &[(String, String)],
        dispatcher: Arc<dyn Dispatcher>,
        initial_refresh_rate: u32,
        span: Span,
    ) -> Result<Self> {
        let engine = factory.create().ok_or(PlaybackError::EngineUnavailable)?;

        check(engine.as_ref(), "request_log_messages", engine.request_log_messages("no"), &span);

        for (name, value) in options {
            let status = engine.set_option(name, value);
            if status < 0 {
                warn!(
                    parent: &span,
                    option = %name,
                    value = %redact_if_sensitive(name, value),
                    error = %engine.error_string(status),
                    "Engine rejected option"
                );
            } else {
                trace!(
                    parent: &span,
                    option = %name,
                    value = %redact_if_sensitive(name, value),
                    "Option applied"
                );
            }
        }

        let status = engine.initialize();
        if status < 0 {
            let message = engine.error_string(status);
            engine.destroy();
            return Err(PlaybackError::EngineCommand {
                command: "initialize".to_string(),
                code: status,
                message,
            });
        }

        for name in OBSERVED_FLAGS {
            check(
                engine.as_ref(),
                "observe_property",
                engine.observe_property(0, name, PropertyFormat::Flag),
                &span,
            );
        }

        info!(parent: &span, options = options.len(), "Engine initialized");

        Ok(Self {
            engine: RwLock::new(Some(engine)),
            surface: RwLock::new(None),
            render_context: AtomicBool::new(false),
            seeking: Arc::new(AtomicBool::new(false)),
            next_userdata: AtomicU64::new(1),
            replies: Mutex::new(HashMap::new()),
            dispatcher,
            refresh_rate: AtomicU32::new(initial_refresh_rate),
            last_redraw: Mutex::new(None),
            span,
        })
    }

    fn engine(&self) -> Option<Arc<dyn MediaEngine>> {
        self.engine.read().clone()
    }

    /// Whether the native handle is still alive.
    pub fn is_alive(&self) -> bool {
        self.engine.read().is_some()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop playback, free the render context and destroy the native handle.
    ///
    /// Idempotent. Replies still pending receive [`ENGINE_UNINITIALIZED`].
    pub fn destroy(&self) {
        let Some(engine) = self.engine.write().take() else {
            return;
        };

        engine.set_wakeup_callback(None);
        engine.command(&["stop"]);
        if self.render_context.swap(false, Ordering::AcqRel) {
            engine.free_render_context();
        }
        engine.destroy();
        self.surface.write().take();

        info!(parent: &self.span, "Engine destroyed");
        self.fail_pending_replies();
    }

    /// React to the engine announcing its own shutdown: release the handle
    /// without sending further commands.
    pub fn handle_shutdown(&self) {
        let Some(engine) = self.engine.write().take() else {
            return;
        };

        engine.set_wakeup_callback(None);
        if self.render_context.swap(false, Ordering::AcqRel) {
            engine.free_render_context();
        }
        engine.destroy();

        info!(parent: &self.span, "Engine shut down");
        self.fail_pending_replies();
    }

    fn fail_pending_replies(&self) {
        let pending: Vec<StatusCallback> = self.replies.lock().drain().map(|(_, cb)| cb).collect();
        for callback in pending {
            self.deliver(callback, ENGINE_UNINITIALIZED);
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Load `url`, replacing the current file.
    ///
    /// Sideloaded audio and subtitle files are appended as external tracks;
    /// `start` is the position in seconds to open at. Returns the native
    /// status, which `completion` also receives.
    pub fn load_file(
        &self,
        url: &str,
        audio_url: Option<&str>,
        subtitle_url: Option<&str>,
        start: Option<f64>,
        force_seekable: bool,
        completion: Option<StatusCallback>,
    ) -> i32 {
        let options = load_options(audio_url, subtitle_url, start, force_seekable);
        debug!(
            parent: &self.span,
            file = %core_runtime::logging::strip_path(url),
            options = %options,
            "Loading file"
        );
        self.command(&["loadfile", url, "replace", "-1", &options], true, completion)
    }

    /// Run a command. `completion` is invoked before returning.
    pub fn command(
        &self,
        args: &[&str],
        check_errors: bool,
        completion: Option<StatusCallback>,
    ) -> i32 {
        let status = match self.engine() {
            Some(engine) => {
                let status = engine.command(args);
                if check_errors && status < 0 {
                    warn!(
                        parent: &self.span,
                        command = %args.first().copied().unwrap_or_default(),
                        status,
                        error = %engine.error_string(status),
                        "Engine command failed"
                    );
                }
                status
            }
            None => ENGINE_UNINITIALIZED,
        };

        if let Some(completion) = completion {
            completion(status);
        }
        status
    }

    /// Queue a command; `completion` receives the reply status on the
    /// dispatcher once the engine has executed it.
    pub fn command_async(&self, args: &[&str], completion: Option<StatusCallback>) {
        let Some(engine) = self.engine() else {
            if let Some(completion) = completion {
                self.deliver(completion, ENGINE_UNINITIALIZED);
            }
            return;
        };

        let userdata = self.register_reply(completion);
        let status = engine.command_async(userdata, args);
        if status < 0 {
            warn!(
                parent: &self.span,
                command = %args.first().copied().unwrap_or_default(),
                status,
                error = %engine.error_string(status),
                "Engine rejected async command"
            );
            self.complete_reply(userdata, status);
        }
    }

    fn register_reply(&self, completion: Option<StatusCallback>) -> u64 {
        let userdata = self.next_userdata.fetch_add(1, Ordering::Relaxed);
        if let Some(completion) = completion {
            self.replies.lock().insert(userdata, completion);
        }
        userdata
    }

    /// Resolve the reply callback registered under `userdata`.
    pub fn complete_reply(&self, userdata: u64, status: i32) {
        let callback = self.replies.lock().remove(&userdata);
        match callback {
            Some(callback) => self.deliver(callback, status),
            None => trace!(parent: &self.span, userdata, "Reply without a pending callback"),
        }
    }

    /// Number of async operations still waiting for a reply.
    pub fn pending_replies(&self) -> usize {
        self.replies.lock().len()
    }

    fn deliver(&self, callback: StatusCallback, status: i32) {
        self.dispatcher.dispatch(Box::new(move || callback(status)));
    }

    /// Seek, unless another seek is still in flight.
    ///
    /// `completion` receives whether the engine accepted the seek, on the
    /// dispatcher; a dropped seek reports `false`.
    pub fn seek(&self, target: SeekTarget, completion: Option<Completion>) {
        if self
            .seeking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(parent: &self.span, ?target, "Seek dropped, another one is in flight");
            if let Some(completion) = completion {
                self.dispatcher.dispatch(Box::new(move || completion(false)));
            }
            return;
        }

        let (seconds, absolute) = match target {
            SeekTarget::Absolute(seconds) => (seconds, true),
            SeekTarget::Relative(seconds) => (seconds, false),
        };
        let seconds = seconds.to_string();
        let mut args = vec!["seek", seconds.as_str()];
        if absolute {
            args.push("absolute");
        }

        let seeking = Arc::clone(&self.seeking);
        self.command_async(
            &args,
            Some(Box::new(move |status| {
                seeking.store(false, Ordering::Release);
                if let Some(completion) = completion {
                    completion(status >= 0);
                }
            })),
        );
    }

    /// Whether a seek is waiting for its reply.
    pub fn is_seeking(&self) -> bool {
        self.seeking.load(Ordering::Acquire)
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn get(&self, name: &str, format: PropertyFormat) -> Option<PropertyValue> {
        self.engine()?.get_property(name, format)
    }

    pub fn get_double(&self, name: &str) -> f64 {
        self.get(name, PropertyFormat::Double)
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0)
    }

    pub fn get_int(&self, name: &str) -> i64 {
        self.get(name, PropertyFormat::Int64)
            .and_then(|value| value.as_i64())
            .unwrap_or(0)
    }

    pub fn get_flag(&self, name: &str) -> bool {
        self.get(name, PropertyFormat::Flag)
            .and_then(|value| value.as_flag())
            .unwrap_or(false)
    }

    /// String value of a property. `None` when unavailable or empty.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.engine()?
            .get_property_string(name)
            .filter(|value| !value.is_empty())
    }

    /// String value of a property, `"unknown"` when unavailable.
    pub fn get_string_or_unknown(&self, name: &str) -> String {
        self.get_string(name)
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn set_string(&self, name: &str, value: &str) -> i32 {
        let Some(engine) = self.engine() else {
            return ENGINE_UNINITIALIZED;
        };
        let status = engine.set_property_string(name, value);
        if status < 0 {
            warn!(
                parent: &self.span,
                property = %name,
                status,
                error = %engine.error_string(status),
                "Property write failed"
            );
        }
        status
    }

    pub fn set_double_async(&self, name: &str, value: f64, completion: Option<StatusCallback>) {
        self.set_async(name, PropertyValue::Double(value), completion);
    }

    pub fn set_flag_async(&self, name: &str, value: bool, completion: Option<StatusCallback>) {
        self.set_async(name, PropertyValue::Flag(value), completion);
    }

    fn set_async(&self, name: &str, value: PropertyValue, completion: Option<StatusCallback>) {
        let Some(engine) = self.engine() else {
            if let Some(completion) = completion {
                self.deliver(completion, ENGINE_UNINITIALIZED);
            }
            return;
        };

        let userdata = self.register_reply(completion);
        let status = engine.set_property_async(userdata, name, value);
        if status < 0 {
            warn!(
                parent: &self.span,
                property = %name,
                status,
                error = %engine.error_string(status),
                "Engine rejected async property write"
            );
            self.complete_reply(userdata, status);
        }
    }

    /// Apply an option after initialization (e.g. `gpu-api` on surface attach).
    pub fn set_option(&self, name: &str, value: &str) -> i32 {
        let Some(engine) = self.engine() else {
            return ENGINE_UNINITIALIZED;
        };
        let status = engine.set_option(name, value);
        check(engine.as_ref(), name, status, &self.span);
        status
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Install the engine wake-up callback, or remove it with `None`.
    pub fn set_wakeup_callback(&self, callback: Option<WakeupCallback>) {
        if let Some(engine) = self.engine() {
            engine.set_wakeup_callback(callback);
        }
    }

    /// Pop the next queued engine event without waiting. `None` once the
    /// queue is empty or the engine is gone.
    pub fn next_event(&self) -> Option<EngineEvent> {
        match self.engine()?.wait_event(0.0) {
            EngineEvent::None => None,
            event => Some(event),
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Create the engine render context. Idempotent.
    pub fn create_render_context(&self) -> Result<()> {
        if self.render_context.load(Ordering::Acquire) {
            return Ok(());
        }
        let engine = self.engine().ok_or(PlaybackError::EngineUnavailable)?;
        let status = engine.create_render_context();
        if status < 0 {
            return Err(PlaybackError::RenderContextUnavailable(status));
        }
        self.render_context.store(true, Ordering::Release);
        debug!(parent: &self.span, "Render context created");
        Ok(())
    }

    pub fn has_render_context(&self) -> bool {
        self.render_context.load(Ordering::Acquire)
    }

    /// Bind `surface` to the render context and start forwarding to it.
    pub fn attach_surface(&self, surface: Arc<dyn RenderSurface>) {
        surface.attach_render_target();
        surface.set_preferred_frame_rate(self.current_refresh_rate());
        *self.surface.write() = Some(surface);
    }

    fn surface(&self) -> Option<Arc<dyn RenderSurface>> {
        self.surface.read().clone()
    }

    /// Resize the attached surface. Non-positive sizes are ignored.
    pub fn set_size(&self, width: f64, height: f64) {
        if !(width > 0.0 && height > 0.0) {
            return;
        }
        if let Some(surface) = self.surface() {
            surface.set_size(width, height);
        }
    }

    /// Ask the surface to draw, at most once per cooldown period.
    pub fn request_redraw(&self) -> bool {
        let Some(surface) = self.surface() else {
            return false;
        };
        {
            let mut last = self.last_redraw.lock();
            let now = Instant::now();
            if last.is_some_and(|at| now.duration_since(at) < REDRAW_COOLDOWN) {
                return false;
            }
            *last = Some(now);
        }
        surface.request_redraw();
        true
    }

    /// Frame rate the engine and surface are currently tuned to.
    pub fn current_refresh_rate(&self) -> u32 {
        self.refresh_rate.load(Ordering::Acquire)
    }

    /// Tell the engine to time frames for `fps` and match the surface's
    /// vertical-sync target to it.
    pub fn update_refresh_rate(&self, fps: u32) {
        self.set_string("display-fps-override", &fps.to_string());
        self.refresh_rate.store(fps, Ordering::Release);
        if let Some(surface) = self.surface() {
            surface.set_preferred_frame_rate(fps);
        }
        debug!(parent: &self.span, fps, "Refresh rate updated");
    }
}

impl Drop for EngineClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn check(engine: &dyn MediaEngine, context: &str, status: i32, span: &Span) {
    if status < 0 {
        warn!(
            parent: span,
            context,
            status,
            error = %engine.error_string(status),
            "Engine call failed"
        );
    }
}

/// Comma-joined per-file options for `loadfile`.
pub fn load_options(
    audio_url: Option<&str>,
    subtitle_url: Option<&str>,
    start: Option<f64>,
    force_seekable: bool,
) -> String {
    let mut options = Vec::new();
    if let Some(start) = start.filter(|s| s.is_finite() && *s > 0.0) {
        options.push(format!("start={}", start as i64));
    }
    if let Some(url) = audio_url {
        options.push(format!("audio-files-append=\"{url}\""));
    }
    if let Some(url) = subtitle_url {
        options.push(format!("sub-files-append=\"{url}\""));
    }
    if force_seekable {
        options.push("force-seekable=yes".to_string());
    }
    options.join(",")
}
