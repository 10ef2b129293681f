//! Helper abstractions used to keep trait bounds aligned with the threading
//! guarantees of the bridge.
//!
//! Native engine callbacks arrive on threads owned by the engine, so every
//! capability handed to the core must be shareable across threads. The marker
//! traits below keep those bounds in one place instead of repeating
//! `Send + Sync` on every trait definition.

/// Marker trait for capabilities shared between the caller, the event worker
/// and the observing context.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait for values moved onto another thread exactly once.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}
