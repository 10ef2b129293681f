//! Workspace façade crate.
//!
//! Re-exports the individual workspace crates so host applications can depend
//! on `mpv-player-workspace` and enable the `playback` feature without wiring
//! `bridge-traits`, `core-runtime` and `core-playback` one by one.

#[cfg(feature = "playback")]
pub use bridge_traits as bridge;
#[cfg(feature = "playback")]
pub use core_playback as playback;
#[cfg(feature = "playback")]
pub use core_runtime as runtime;
