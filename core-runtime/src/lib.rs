//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback core:
//! - Logging and tracing infrastructure
//! - Runtime configuration
//! - Typed event bus
//! - Serial dispatch and timer primitives
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the playback crate depends
//! on. It establishes the threading conventions (one named thread per serial
//! context, no async runtime required), the logging conventions and the event
//! broadcasting mechanism used by the player.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod logging;
pub mod timer;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use dispatch::SerialDispatcher;
pub use error::{Error, Result};
pub use events::{EventBus, EventStream};
pub use timer::{RepeatingTimer, Timeout};
