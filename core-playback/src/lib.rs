//! # Playback Engine Adapter
//!
//! Wraps a native, event-driven media engine behind a safe, observable
//! playback API.
//!
//! ## Overview
//!
//! This crate handles:
//! - Engine lifecycle, typed property access and async commands ([`client`])
//! - Draining engine events off the wake-up callback ([`pump`])
//! - Embedded track discovery and sideload resolution ([`tracks`])
//! - The public player facade and its state machine ([`player`])
//! - Periodic time observers ([`observers`])
//! - Display refresh rate matching ([`refresh`])
//!
//! ## Threading
//!
//! Engine events are drained on a dedicated `engine-events` thread and handed
//! to the main dispatcher before any published state changes. Time observers
//! and refresh checks tick on their own timer threads. No call blocks on
//! native I/O.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod item;
pub mod metrics;
pub mod observers;
pub mod options;
pub mod player;
pub mod pump;
pub mod refresh;
pub mod status;
pub mod tracks;

pub use client::{status_completion, Completion, EngineClient, SeekTarget, StatusCallback};
pub use config::{PlaybackConfig, PlayerConfig, PlayerConfigBuilder};
pub use error::{PlaybackError, Result};
pub use events::PlayerEvent;
pub use item::{AssetKind, AudioAsset, PlayerItem, Subtitle};
pub use metrics::PlaybackMetrics;
pub use observers::{ObserverToken, TimeObserverHub};
pub use player::{Player, DISABLE_SUBTITLES};
pub use pump::{EngineEventHandler, EventPump};
pub use refresh::RefreshSync;
pub use status::{PlaybackTime, TimeControlStatus};
pub use tracks::{DiscoveredTrack, Resolution, TrackKind, TrackRegistry};
