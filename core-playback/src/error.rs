//! # Playback Error Types
//!
//! Error types for the playback engine adapter.
//!
//! Most player operations never surface these to the caller: rejected
//! requests report `false` on their completion and log a warning. The
//! `try_*` entry points and configuration validation return them directly.

use crate::item::AssetKind;
use thiserror::Error;

/// Errors that can occur in the playback engine adapter.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Environment Errors (fatal)
    // ========================================================================
    /// The native engine could not be allocated.
    #[error("Native engine could not be created")]
    EngineUnavailable,

    /// The engine refused to create a rendering context.
    #[error("Render context could not be created (status {0})")]
    RenderContextUnavailable(i32),

    // ========================================================================
    // Native Command Errors
    // ========================================================================
    /// A command or property write returned a negative status.
    #[error("Engine command '{command}' failed with status {code}: {message}")]
    EngineCommand {
        command: String,
        code: i32,
        message: String,
    },

    // ========================================================================
    // Rejected Operations
    // ========================================================================
    /// No embedded track or sideloaded asset carries this identifier.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// The operation makes no sense for the loaded asset kind.
    #[error("{operation} is not supported for {kind:?} items")]
    UnsupportedForAsset {
        operation: &'static str,
        kind: AssetKind,
    },

    /// A seek is already in flight.
    #[error("Seek already in progress")]
    SeekInProgress,

    /// Attempted operation when no item is loaded.
    #[error("No item loaded")]
    NoItemLoaded,

    /// The file-loaded confirmation for a load never arrived.
    #[error("Load {generation} timed out waiting for the file to open")]
    LoadTimedOut { generation: u64 },

    // ========================================================================
    // Configuration & Runtime Errors
    // ========================================================================
    /// A configuration value is out of range.
    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// Runtime infrastructure error (dispatcher, timers, config builder).
    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    /// Failed to spawn a worker thread.
    #[error("Thread error: {0}")]
    Thread(#[from] std::io::Error),
}

impl PlaybackError {
    /// Returns `true` for environment faults that leave the player unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlaybackError::EngineUnavailable | PlaybackError::RenderContextUnavailable(_)
        )
    }

    /// Returns `true` if the error is a rejected request rather than a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PlaybackError::TrackNotFound(_)
                | PlaybackError::UnsupportedForAsset { .. }
                | PlaybackError::SeekInProgress
                | PlaybackError::NoItemLoaded
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
