//! # Runtime Configuration
//!
//! Holds the execution capabilities shared by every player instance: the
//! observing context on which published state changes, and the logging setup.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::RuntimeConfig;
//! use core_runtime::logging::LoggingConfig;
//! use std::sync::Arc;
//!
//! let runtime = RuntimeConfig::builder()
//!     .main_dispatcher(Arc::new(MyUiThreadDispatcher))
//!     .logging(LoggingConfig::default())
//!     .build()?;
//! runtime.init_logging()?;
//! ```
//!
//! When no dispatcher is injected, `build()` spawns a [`SerialDispatcher`]
//! named `player-main` and uses it as the observing context.

use crate::dispatch::SerialDispatcher;
use crate::error::{Error, Result};
use crate::logging::{self, LoggingConfig};
use bridge_traits::dispatch::Dispatcher;
use std::fmt;
use std::sync::Arc;

/// Thread name of the default observing context.
pub const DEFAULT_MAIN_DISPATCHER_NAME: &str = "player-main";

/// Shared runtime capabilities.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Context on which published state is mutated and observers are notified
    pub main_dispatcher: Arc<dyn Dispatcher>,

    /// Logging setup applied by [`RuntimeConfig::init_logging`]
    pub logging: Option<LoggingConfig>,
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Install the global `tracing` subscriber if a logging config was given.
    ///
    /// Hosts that install their own subscriber simply leave `logging` unset.
    pub fn init_logging(&self) -> Result<()> {
        match &self.logging {
            Some(config) => logging::init_logging(config.clone()),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("main_dispatcher", &"Dispatcher { ... }")
            .field("logging", &self.logging.as_ref().map(|c| c.format))
            .finish()
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Default)]
pub struct RuntimeConfigBuilder {
    main_dispatcher: Option<Arc<dyn Dispatcher>>,
    logging: Option<LoggingConfig>,
    main_dispatcher_name: Option<String>,
}

impl RuntimeConfigBuilder {
    /// Use a host-provided observing context (typically the UI thread).
    pub fn main_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.main_dispatcher = Some(dispatcher);
        self
    }

    /// Thread name for the default dispatcher. Ignored when one is injected.
    pub fn main_dispatcher_name(mut self, name: impl Into<String>) -> Self {
        self.main_dispatcher_name = Some(name.into());
        self
    }

    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    pub fn build(self) -> Result<RuntimeConfig> {
        let main_dispatcher = match self.main_dispatcher {
            Some(dispatcher) => dispatcher,
            None => {
                let name = self
                    .main_dispatcher_name
                    .unwrap_or_else(|| DEFAULT_MAIN_DISPATCHER_NAME.to_string());
                if name.trim().is_empty() {
                    return Err(Error::Config(
                        "Dispatcher name cannot be empty".to_string(),
                    ));
                }
                Arc::new(SerialDispatcher::new(name)?)
            }
        };

        Ok(RuntimeConfig {
            main_dispatcher,
            logging: self.logging,
        })
    }
}
