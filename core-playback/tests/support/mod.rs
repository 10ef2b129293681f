//! Shared test doubles for the playback integration tests.
//!
//! [`FakeEngine`] is a scripted in-memory [`MediaEngine`]: it stores
//! properties, records every option and command, answers async commands and
//! property writes with reply events, and wakes the pump whenever it queues
//! an event.

#![allow(dead_code)]

use bridge_traits::engine::{
    EndFileReason, EngineEvent, EngineFactory, MediaEngine, PropertyFormat, PropertyValue,
    WakeupCallback,
};
use core_playback::{PlaybackConfig, Player, PlayerConfig};
use core_runtime::SerialDispatcher;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(3);

#[derive(Default)]
struct FakeState {
    options: Vec<(String, String)>,
    log_level: Option<String>,
    initialized: bool,
    observed: Vec<String>,
    properties: HashMap<String, PropertyValue>,
    commands: Vec<Vec<String>>,
    async_commands: Vec<(u64, Vec<String>)>,
    property_writes: Vec<(String, String)>,
    events: VecDeque<EngineEvent>,
    hold_replies: bool,
    held: Vec<u64>,
    manual_file_loaded: bool,
    failing_commands: HashMap<String, i32>,
    render_context_status: i32,
    render_contexts_created: usize,
    render_contexts_freed: usize,
    destroyed: usize,
}

pub struct FakeEngine {
    state: Mutex<FakeState>,
    wakeup: Mutex<Option<WakeupCallback>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            wakeup: Mutex::new(None),
        })
    }

    pub fn factory(self: &Arc<Self>) -> Arc<dyn EngineFactory> {
        let engine = Arc::clone(self);
        Arc::new(move || -> Option<Arc<dyn MediaEngine>> {
            Some(Arc::clone(&engine) as Arc<dyn MediaEngine>)
        })
    }

    // ------------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------------

    pub fn set_property(&self, name: &str, value: PropertyValue) {
        self.state.lock().properties.insert(name.to_string(), value);
    }

    /// Describe the track list as `(type, id, lang, title)` rows.
    pub fn set_tracks(&self, tracks: &[(&str, &str, Option<&str>, Option<&str>)]) {
        let mut state = self.state.lock();
        state
            .properties
            .retain(|name, _| !name.starts_with("track-list/"));
        state.properties.insert(
            "track-list/count".to_string(),
            PropertyValue::Int64(tracks.len() as i64),
        );
        for (index, (kind, id, lang, title)) in tracks.iter().enumerate() {
            let mut put = |field: &str, value: &str| {
                state.properties.insert(
                    format!("track-list/{index}/{field}"),
                    PropertyValue::String(value.to_string()),
                );
            };
            put("type", kind);
            put("id", id);
            if let Some(lang) = lang {
                put("lang", lang);
            }
            if let Some(title) = title {
                put("title", title);
            }
        }
    }

    /// Stop answering `loadfile` with a file-loaded event.
    pub fn manual_file_loaded(&self) {
        self.state.lock().manual_file_loaded = true;
    }

    /// Keep async command replies until [`FakeEngine::release_replies`].
    pub fn hold_replies(&self) {
        self.state.lock().hold_replies = true;
    }

    pub fn release_replies(&self, status: i32) {
        let held = {
            let mut state = self.state.lock();
            state.hold_replies = false;
            std::mem::take(&mut state.held)
        };
        for userdata in held {
            self.push_event(EngineEvent::CommandReply {
                userdata,
                error: status,
            });
        }
    }

    pub fn fail_command(&self, name: &str, status: i32) {
        self.state
            .lock()
            .failing_commands
            .insert(name.to_string(), status);
    }

    pub fn fail_render_context(&self, status: i32) {
        self.state.lock().render_context_status = status;
    }

    pub fn push_event(&self, event: EngineEvent) {
        self.state.lock().events.push_back(event);
        self.wake();
    }

    pub fn emit_file_loaded(&self) {
        self.push_event(EngineEvent::FileLoaded);
    }

    /// Change a property and report it as an observed change.
    pub fn emit_property(&self, name: &str, value: PropertyValue) {
        self.set_property(name, value.clone());
        self.push_event(EngineEvent::PropertyChange {
            name: name.to_string(),
            value,
        });
    }

    pub fn emit_end_file(&self, reason: EndFileReason) {
        self.push_event(EngineEvent::EndFile { reason });
    }

    fn wake(&self) {
        if let Some(callback) = self.wakeup.lock().as_ref() {
            callback();
        }
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn options(&self) -> Vec<(String, String)> {
        self.state.lock().options.clone()
    }

    pub fn option(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .options
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn log_level(&self) -> Option<String> {
        self.state.lock().log_level.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn observed(&self) -> Vec<String> {
        self.state.lock().observed.clone()
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.lock().commands.clone()
    }

    /// Synchronous commands whose first argument is `name`.
    pub fn commands_named(&self, name: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|args| args.first().map(String::as_str) == Some(name))
            .collect()
    }

    pub fn async_commands_named(&self, name: &str) -> Vec<Vec<String>> {
        self.state
            .lock()
            .async_commands
            .iter()
            .filter(|(_, args)| args.first().map(String::as_str) == Some(name))
            .map(|(_, args)| args.clone())
            .collect()
    }

    /// Property writes (string and async) as `(name, value)`.
    pub fn writes_of(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .property_writes
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn string_property(&self, name: &str) -> Option<String> {
        self.state.lock().properties.get(name).map(render)
    }

    pub fn render_contexts(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.render_contexts_created, state.render_contexts_freed)
    }

    pub fn destroy_count(&self) -> usize {
        self.state.lock().destroyed
    }

    pub fn has_wakeup_callback(&self) -> bool {
        self.wakeup.lock().is_some()
    }
}

fn render(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Flag(true) => "yes".to_string(),
        PropertyValue::Flag(false) => "no".to_string(),
        PropertyValue::Int64(v) => v.to_string(),
        PropertyValue::Double(v) => v.to_string(),
        PropertyValue::String(v) => v.clone(),
        PropertyValue::None => String::new(),
    }
}

impl MediaEngine for FakeEngine {
    fn set_option(&self, name: &str, value: &str) -> i32 {
        self.state
            .lock()
            .options
            .push((name.to_string(), value.to_string()));
        0
    }

    fn initialize(&self) -> i32 {
        self.state.lock().initialized = true;
        0
    }

    fn request_log_messages(&self, min_level: &str) -> i32 {
        self.state.lock().log_level = Some(min_level.to_string());
        0
    }

    fn observe_property(&self, _userdata: u64, name: &str, _format: PropertyFormat) -> i32 {
        self.state.lock().observed.push(name.to_string());
        0
    }

    fn set_wakeup_callback(&self, callback: Option<WakeupCallback>) {
        *self.wakeup.lock() = callback;
    }

    fn command(&self, args: &[&str]) -> i32 {
        let name = args.first().copied().unwrap_or_default();
        let (status, follow_up) = {
            let mut state = self.state.lock();
            state
                .commands
                .push(args.iter().map(|a| a.to_string()).collect());
            let status = state.failing_commands.get(name).copied().unwrap_or(0);

            let follow_up = match (name, status) {
                (_, status) if status < 0 => None,
                ("loadfile", _) if !state.manual_file_loaded => Some(EngineEvent::FileLoaded),
                ("stop", _) => Some(EngineEvent::EndFile {
                    reason: EndFileReason::Stop,
                }),
                ("cycle", _) if args.get(1) == Some(&"pause") => {
                    let paused = state
                        .properties
                        .get("pause")
                        .and_then(PropertyValue::as_flag)
                        .unwrap_or(false);
                    state
                        .properties
                        .insert("pause".to_string(), PropertyValue::Flag(!paused));
                    Some(EngineEvent::PropertyChange {
                        name: "pause".to_string(),
                        value: PropertyValue::Flag(!paused),
                    })
                }
                _ => None,
            };
            (status, follow_up)
        };

        if let Some(event) = follow_up {
            self.push_event(event);
        }
        status
    }

    fn command_async(&self, userdata: u64, args: &[&str]) -> i32 {
        let hold = {
            let mut state = self.state.lock();
            state
                .async_commands
                .push((userdata, args.iter().map(|a| a.to_string()).collect()));
            if state.hold_replies {
                state.held.push(userdata);
            }
            state.hold_replies
        };
        if !hold {
            self.push_event(EngineEvent::CommandReply { userdata, error: 0 });
        }
        0
    }

    fn get_property(&self, name: &str, _format: PropertyFormat) -> Option<PropertyValue> {
        self.state.lock().properties.get(name).cloned()
    }

    fn get_property_string(&self, name: &str) -> Option<String> {
        self.state.lock().properties.get(name).map(render)
    }

    fn set_property_string(&self, name: &str, value: &str) -> i32 {
        let mut state = self.state.lock();
        state
            .property_writes
            .push((name.to_string(), value.to_string()));
        state
            .properties
            .insert(name.to_string(), PropertyValue::String(value.to_string()));
        0
    }

    fn set_property_async(&self, userdata: u64, name: &str, value: PropertyValue) -> i32 {
        let observed = {
            let mut state = self.state.lock();
            state.property_writes.push((name.to_string(), render(&value)));
            state.properties.insert(name.to_string(), value.clone());
            state.observed.iter().any(|n| n == name)
        };
        if observed {
            self.push_event(EngineEvent::PropertyChange {
                name: name.to_string(),
                value,
            });
        }
        self.push_event(EngineEvent::SetPropertyReply { userdata, error: 0 });
        0
    }

    fn wait_event(&self, _timeout: f64) -> EngineEvent {
        self.state
            .lock()
            .events
            .pop_front()
            .unwrap_or(EngineEvent::None)
    }

    fn create_render_context(&self) -> i32 {
        let mut state = self.state.lock();
        if state.render_context_status >= 0 {
            state.render_contexts_created += 1;
        }
        state.render_context_status
    }

    fn free_render_context(&self) {
        self.state.lock().render_contexts_freed += 1;
    }

    fn error_string(&self, code: i32) -> String {
        format!("fake error {code}")
    }

    fn destroy(&self) {
        self.state.lock().destroyed += 1;
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: Arc<FakeEngine>,
    pub main: Arc<SerialDispatcher>,
    pub player: Player,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PlaybackConfig::default())
    }

    pub fn with_config(playback: PlaybackConfig) -> Self {
        Self::with_engine(FakeEngine::new(), playback)
    }

    pub fn with_engine(engine: Arc<FakeEngine>, playback: PlaybackConfig) -> Self {
        let main = Arc::new(SerialDispatcher::new("test-main").expect("dispatcher"));
        let config = PlayerConfig::builder()
            .engine_factory(engine.factory())
            .main_dispatcher(main.clone())
            .playback(playback)
            .build()
            .expect("config");
        let player = Player::try_new(config).expect("player");
        Self {
            engine,
            main,
            player,
        }
    }

    /// Block until the main dispatcher has run everything queued so far.
    pub fn flush(&self) {
        assert!(self.main.flush(WAIT), "main dispatcher did not drain");
    }
}

/// Poll `condition` until it holds or [`WAIT`] elapses.
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Completion that reports its outcome on a channel.
pub fn completion() -> (
    Option<core_playback::Completion>,
    crossbeam_channel::Receiver<bool>,
) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (
        Some(Box::new(move |ok| {
            let _ = tx.send(ok);
        })),
        rx,
    )
}
