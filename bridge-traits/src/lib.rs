//! # Host Bridge Traits
//!
//! Capability traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and everything it
//! treats as an external collaborator: the native media engine, the rendering
//! surface, the display, the host's UI thread and the host's logging pipeline.
//! Each trait represents a capability the core requires but that is provided
//! differently per platform.
//!
//! ## Traits
//!
//! ### Engine
//! - [`MediaEngine`](engine::MediaEngine) - Opaque native engine (options, commands, properties, events)
//! - [`EngineFactory`](engine::EngineFactory) - Allocates engine instances
//!
//! ### Presentation
//! - [`RenderSurface`](render::RenderSurface) - View receiving decoded frames
//! - [`DisplayInfo`](render::DisplayInfo) - Display refresh rate source
//!
//! ### Execution & Utilities
//! - [`Dispatcher`](dispatch::Dispatcher) - Serial execution context (UI thread, observer queues)
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Fallible bridge operations use [`BridgeError`](error::BridgeError). Engine
//! methods keep the native integer status convention because the core
//! interprets those codes itself.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`. Engine callbacks arrive on
//! engine-owned threads and the core shares these capabilities between its
//! event worker, its timers and the observing context.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod logging;
pub mod platform;
pub mod render;

pub use error::BridgeError;

// Re-export commonly used types
pub use dispatch::{Dispatcher, InlineDispatcher, Job};
pub use engine::{
    EndFileReason, EngineEvent, EngineFactory, MediaEngine, PropertyFormat, PropertyValue,
    WakeupCallback, ENGINE_UNINITIALIZED,
};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use render::{DisplayInfo, FixedDisplay, RenderSurface, FALLBACK_REFRESH_RATE};
