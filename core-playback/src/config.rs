//! # Playback Configuration
//!
//! [`PlaybackConfig`] holds the tunables of a player (timer intervals, load
//! watchdog, engine option overrides, fallbacks). It is plain serde data so
//! hosts can ship it in their own settings files.
//!
//! [`PlayerConfig`] bundles it with the injected capabilities a player needs:
//!
//! ```ignore
//! use core_playback::config::{PlaybackConfig, PlayerConfig};
//! use std::sync::Arc;
//!
//! let config = PlayerConfig::builder()
//!     .engine_factory(Arc::new(MyEngineFactory))
//!     .main_dispatcher(Arc::new(MyUiThreadDispatcher))
//!     .playback(PlaybackConfig::default())
//!     .build()?;
//! ```

use crate::error::{PlaybackError, Result};
use bridge_traits::dispatch::Dispatcher;
use bridge_traits::engine::EngineFactory;
use bridge_traits::render::FALLBACK_REFRESH_RATE;
use core_runtime::config::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Span;
use uuid::Uuid;

/// Player tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Interval used when a time observer is registered without one.
    ///
    /// Default: 0.5 seconds.
    #[serde(default = "default_time_update_interval")]
    pub time_update_interval: Duration,

    /// How often [`RefreshSync`](crate::refresh::RefreshSync) compares the
    /// display rate with the content frame rate.
    ///
    /// Default: 0.5 seconds.
    #[serde(default = "default_refresh_check_interval")]
    pub refresh_check_interval: Duration,

    /// Whether display refresh rate matching runs at all.
    ///
    /// Default: false.
    #[serde(default)]
    pub sync_display_refresh_rate: bool,

    /// Refresh rate assumed before anything was measured.
    ///
    /// Default: 60.
    #[serde(default = "default_refresh_rate")]
    pub default_refresh_rate: u32,

    /// Upper bound on waiting for the engine to report a load as opened.
    ///
    /// Default: 15 seconds.
    #[serde(default = "default_load_timeout")]
    pub load_timeout: Duration,

    /// Buffer size of the player event bus.
    ///
    /// Default: 100.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Replacement values for the startup option table, by option name.
    /// Naming a disabled entry enables it.
    #[serde(default)]
    pub option_overrides: BTreeMap<String, String>,

    /// Options applied after the table, in key order.
    #[serde(default)]
    pub extra_options: BTreeMap<String, String>,

    /// Aspect ratio reported while the engine has none.
    ///
    /// Default: 16/9.
    #[serde(default = "default_aspect_ratio")]
    pub default_aspect_ratio: f64,

    /// Display height reported while the engine has none.
    ///
    /// Default: 500.
    #[serde(default = "default_display_height")]
    pub default_display_height: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            time_update_interval: default_time_update_interval(),
            refresh_check_interval: default_refresh_check_interval(),
            sync_display_refresh_rate: false,
            default_refresh_rate: default_refresh_rate(),
            load_timeout: default_load_timeout(),
            event_channel_capacity: default_event_channel_capacity(),
            option_overrides: BTreeMap::new(),
            extra_options: BTreeMap::new(),
            default_aspect_ratio: default_aspect_ratio(),
            default_display_height: default_display_height(),
        }
    }
}

impl PlaybackConfig {
    /// Set an engine option override.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.option_overrides.insert(name.into(), value.into());
        self
    }

    pub fn with_refresh_sync(mut self, enabled: bool) -> Self {
        self.sync_display_refresh_rate = enabled;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.time_update_interval.is_zero() {
            return Err(invalid("time_update_interval must be > 0"));
        }

        if self.refresh_check_interval.is_zero() {
            return Err(invalid("refresh_check_interval must be > 0"));
        }

        if self.load_timeout.is_zero() {
            return Err(invalid("load_timeout must be > 0"));
        }

        if self.event_channel_capacity == 0 {
            return Err(invalid("event_channel_capacity must be > 0"));
        }

        if self.default_refresh_rate == 0 {
            return Err(invalid("default_refresh_rate must be > 0"));
        }

        if !(self.default_aspect_ratio.is_finite() && self.default_aspect_ratio > 0.0) {
            return Err(invalid("default_aspect_ratio must be a positive number"));
        }

        if !(self.default_display_height.is_finite() && self.default_display_height > 0.0) {
            return Err(invalid("default_display_height must be a positive number"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> PlaybackError {
    PlaybackError::InvalidConfig(message.to_string())
}

// Default value functions for serde

fn default_time_update_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_refresh_check_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_refresh_rate() -> u32 {
    FALLBACK_REFRESH_RATE
}

fn default_load_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_event_channel_capacity() -> usize {
    core_runtime::events::DEFAULT_EVENT_BUFFER_SIZE
}

fn default_aspect_ratio() -> f64 {
    16.0 / 9.0
}

fn default_display_height() -> f64 {
    500.0
}

// ============================================================================
// Player configuration
// ============================================================================

/// Everything a [`Player`](crate::player::Player) is constructed from.
#[derive(Clone)]
pub struct PlayerConfig {
    /// Allocates the native engine.
    pub engine_factory: Arc<dyn EngineFactory>,
    /// Observing context and logging setup.
    pub runtime: RuntimeConfig,
    pub playback: PlaybackConfig,
    /// Parent span of everything the player logs.
    pub span: Span,
}

impl PlayerConfig {
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    /// Context on which published state changes.
    pub fn main_dispatcher(&self) -> Arc<dyn Dispatcher> {
        Arc::clone(&self.runtime.main_dispatcher)
    }
}

impl fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("engine_factory", &"EngineFactory { ... }")
            .field("runtime", &self.runtime)
            .field("playback", &self.playback)
            .finish()
    }
}

/// Builder for [`PlayerConfig`]. Fails fast on missing capabilities.
#[derive(Default)]
pub struct PlayerConfigBuilder {
    engine_factory: Option<Arc<dyn EngineFactory>>,
    main_dispatcher: Option<Arc<dyn Dispatcher>>,
    runtime: Option<RuntimeConfig>,
    playback: Option<PlaybackConfig>,
    span: Option<Span>,
}

impl PlayerConfigBuilder {
    pub fn engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engine_factory = Some(factory);
        self
    }

    /// Shortcut for a runtime with this observing context and no logging setup.
    pub fn main_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.main_dispatcher = Some(dispatcher);
        self
    }

    /// Shared runtime configuration. Takes precedence over `main_dispatcher`.
    pub fn runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = Some(playback);
        self
    }

    /// Parent span for the player's logs. Defaults to a `player` span with a
    /// random `player_id`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> Result<PlayerConfig> {
        let engine_factory = self.engine_factory.ok_or_else(engine_factory_missing_error)?;

        let playback = self.playback.unwrap_or_default();
        playback.validate()?;

        let runtime = match (self.runtime, self.main_dispatcher) {
            (Some(runtime), _) => runtime,
            (None, Some(dispatcher)) => RuntimeConfig::builder().main_dispatcher(dispatcher).build()?,
            (None, None) => RuntimeConfig::builder().build()?,
        };

        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("player", player_id = %Uuid::new_v4()));

        Ok(PlayerConfig {
            engine_factory,
            runtime,
            playback,
            span,
        })
    }
}

fn engine_factory_missing_error() -> PlaybackError {
    PlaybackError::Runtime(core_runtime::Error::CapabilityMissing {
        capability: "EngineFactory".to_string(),
        message: "An EngineFactory is required to allocate the native media engine. \
                 Use .engine_factory() to inject the platform binding."
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::dispatch::InlineDispatcher;
    use bridge_traits::engine::MediaEngine;

    fn no_engine() -> Arc<dyn EngineFactory> {
        Arc::new(|| -> Option<Arc<dyn MediaEngine>> { None })
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PlaybackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_update_interval, Duration::from_millis(500));
        assert_eq!(config.load_timeout, Duration::from_secs(15));
        assert_eq!(config.default_refresh_rate, 60);
        assert!(!config.sync_display_refresh_rate);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = PlaybackConfig {
            time_update_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PlaybackError::InvalidConfig(_))));

        let config = PlaybackConfig {
            event_channel_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PlaybackConfig {
            default_aspect_ratio: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PlaybackConfig {
            default_display_height: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_fills_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{"sync_display_refresh_rate": true}"#).unwrap();
        assert!(config.sync_display_refresh_rate);
        assert_eq!(config.event_channel_capacity, 100);
        assert!((config.default_aspect_ratio - 16.0 / 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_requires_engine_factory() {
        let result = PlayerConfig::builder()
            .main_dispatcher(Arc::new(InlineDispatcher))
            .build();
        match result {
            Err(PlaybackError::Runtime(core_runtime::Error::CapabilityMissing {
                capability,
                ..
            })) => assert_eq!(capability, "EngineFactory"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_builder_validates_playback() {
        let result = PlayerConfig::builder()
            .engine_factory(no_engine())
            .main_dispatcher(Arc::new(InlineDispatcher))
            .playback(PlaybackConfig {
                load_timeout: Duration::ZERO,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(PlaybackError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_with_injected_dispatcher() {
        let config = PlayerConfig::builder()
            .engine_factory(no_engine())
            .main_dispatcher(Arc::new(InlineDispatcher))
            .playback(PlaybackConfig::default().with_option("hwdec", "no"))
            .build()
            .unwrap();
        assert_eq!(
            config.playback.option_overrides.get("hwdec").map(String::as_str),
            Some("no")
        );
        assert!(config.runtime.logging.is_none());
    }
}
