//! Native media engine bridge.
//!
//! The core never decodes, demuxes or renders media itself. It drives an
//! opaque, event-driven engine through the [`MediaEngine`] capability: options
//! are applied before initialization, playback is controlled with string
//! commands and typed properties, and everything the engine wants to report
//! is queued internally until the core drains it with
//! [`MediaEngine::wait_event`].
//!
//! ## Wake-up contract
//!
//! The engine signals "events are pending" by invoking the callback installed
//! with [`MediaEngine::set_wakeup_callback`]. The callback may run on any
//! engine-owned thread and is edge-triggered: a single invocation may stand
//! for several queued events. Implementations of the callback must not call
//! back into the engine.
//!
//! ## Threading
//!
//! Implementations must be `Send + Sync`. Property reads are expected to be
//! bounded local operations; commands must return immediately (their results
//! arrive later as reply events when issued through the async variants).

use crate::platform::PlatformSendSync;
use std::fmt;
use std::sync::Arc;

/// Callback installed on the engine to signal pending events.
pub type WakeupCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Status code returned when an operation is attempted without an engine.
pub const ENGINE_UNINITIALIZED: i32 = -3;

/// Value format used for property reads and observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyFormat {
    Flag,
    Int64,
    Double,
    String,
}

/// A typed property value exchanged with the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Flag(bool),
    Int64(i64),
    Double(f64),
    String(String),
    /// The property exists but currently has no value.
    None,
}

impl PropertyValue {
    /// Interpret the value as a flag. Numeric values are truthy when positive.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(flag) => Some(*flag),
            PropertyValue::Int64(value) => Some(*value > 0),
            PropertyValue::String(value) => match value.as_str() {
                "yes" | "true" => Some(true),
                "no" | "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int64(value) => Some(*value),
            PropertyValue::Flag(flag) => Some(i64::from(*flag)),
            PropertyValue::Double(value) if value.is_finite() => Some(*value as i64),
            PropertyValue::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(value) => Some(*value),
            PropertyValue::Int64(value) => Some(*value as f64),
            PropertyValue::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// The format matching this value, if it carries one.
    pub fn format(&self) -> Option<PropertyFormat> {
        match self {
            PropertyValue::Flag(_) => Some(PropertyFormat::Flag),
            PropertyValue::Int64(_) => Some(PropertyFormat::Int64),
            PropertyValue::Double(_) => Some(PropertyFormat::Double),
            PropertyValue::String(_) => Some(PropertyFormat::String),
            PropertyValue::None => None,
        }
    }
}

/// Why the engine stopped playing the current file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndFileReason {
    /// Playback reached the end of the media.
    Eof,
    /// Playback was stopped by a command (`stop`, `loadfile replace`, ...).
    Stop,
    /// The engine is quitting.
    Quit,
    /// The file could not be played.
    Error,
    /// The file was a playlist or redirect.
    Redirect,
    Unknown,
}

/// An event drained from the engine's queue.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The queue is empty.
    None,
    /// The engine is shutting down; its handle must no longer be used.
    Shutdown,
    /// A log line emitted by the engine.
    LogMessage {
        prefix: String,
        level: String,
        text: String,
    },
    /// The file passed to `loadfile` was opened and its tracks are known.
    FileLoaded,
    /// Playback (re)started after loading or seeking.
    PlaybackRestart,
    /// An observed property changed.
    PropertyChange { name: String, value: PropertyValue },
    /// The current file finished or was unloaded.
    EndFile { reason: EndFileReason },
    /// Reply to [`MediaEngine::command_async`].
    CommandReply { userdata: u64, error: i32 },
    /// Reply to [`MediaEngine::set_property_async`].
    SetPropertyReply { userdata: u64, error: i32 },
    /// Any event the core does not interpret.
    Other(String),
}

impl EngineEvent {
    /// Short engine-style event name, used for logging.
    pub fn name(&self) -> &str {
        match self {
            EngineEvent::None => "none",
            EngineEvent::Shutdown => "shutdown",
            EngineEvent::LogMessage { .. } => "log-message",
            EngineEvent::FileLoaded => "file-loaded",
            EngineEvent::PlaybackRestart => "playback-restart",
            EngineEvent::PropertyChange { .. } => "property-change",
            EngineEvent::EndFile { .. } => "end-file",
            EngineEvent::CommandReply { .. } => "command-reply",
            EngineEvent::SetPropertyReply { .. } => "set-property-reply",
            EngineEvent::Other(name) => name,
        }
    }
}

/// Opaque native media engine.
///
/// Every method returning `i32` follows the native convention: `>= 0` is
/// success, negative values are error codes that can be described with
/// [`MediaEngine::error_string`].
pub trait MediaEngine: PlatformSendSync {
    /// Set a startup option. Only meaningful before [`MediaEngine::initialize`]
    /// for most options.
    fn set_option(&self, name: &str, value: &str) -> i32;

    /// Finish startup. Options applied afterwards may be ignored.
    fn initialize(&self) -> i32;

    /// Select the minimum level of log messages delivered as events
    /// (`"no"` disables them).
    fn request_log_messages(&self, min_level: &str) -> i32;

    /// Ask the engine to emit [`EngineEvent::PropertyChange`] for `name`.
    fn observe_property(&self, userdata: u64, name: &str, format: PropertyFormat) -> i32;

    /// Install (or remove, with `None`) the wake-up callback.
    fn set_wakeup_callback(&self, callback: Option<WakeupCallback>);

    /// Run a command. Returns as soon as the command was queued or executed.
    fn command(&self, args: &[&str]) -> i32;

    /// Queue a command; its result arrives as [`EngineEvent::CommandReply`]
    /// carrying `userdata`.
    fn command_async(&self, userdata: u64, args: &[&str]) -> i32;

    /// Read a property in the given format. `None` when unavailable.
    fn get_property(&self, name: &str, format: PropertyFormat) -> Option<PropertyValue>;

    /// Read a property formatted as a string. `None` when unavailable.
    fn get_property_string(&self, name: &str) -> Option<String>;

    /// Write a property from its string representation.
    fn set_property_string(&self, name: &str, value: &str) -> i32;

    /// Queue a property write; completion arrives as
    /// [`EngineEvent::SetPropertyReply`].
    fn set_property_async(&self, userdata: u64, name: &str, value: PropertyValue) -> i32;

    /// Pop the next queued event, waiting at most `timeout` seconds
    /// (`0.0` polls). Returns [`EngineEvent::None`] when the queue is empty.
    fn wait_event(&self, timeout: f64) -> EngineEvent;

    /// Create the rendering context used by the host surface.
    fn create_render_context(&self) -> i32;

    /// Free the rendering context, if one was created.
    fn free_render_context(&self);

    /// Human-readable description of a negative status code.
    fn error_string(&self, code: i32) -> String;

    /// Destroy the native instance. No other method is called afterwards.
    fn destroy(&self);
}

/// Allocates native engine instances.
pub trait EngineFactory: PlatformSendSync {
    /// Allocate a fresh, uninitialized engine. `None` means the native
    /// library could not allocate an instance.
    fn create(&self) -> Option<Arc<dyn MediaEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Option<Arc<dyn MediaEngine>> + Send + Sync,
{
    fn create(&self) -> Option<Arc<dyn MediaEngine>> {
        self()
    }
}

impl fmt::Debug for dyn MediaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MediaEngine")
    }
}
