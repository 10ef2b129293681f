//! Rendering surface and display abstractions.
//!
//! The graphical view that receives decoded frames lives in the host. The core
//! only needs a narrow capability set from it: attach the engine's render
//! context, request a redraw, follow size changes and match its vertical-sync
//! target to a frame rate. Exactly one concrete surface is selected per target
//! platform by the host.

use crate::platform::PlatformSendSync;

/// Refresh rate used when the display cannot report one.
pub const FALLBACK_REFRESH_RATE: u32 = 60;

/// Host view that presents engine frames.
///
/// Methods may be invoked from any thread; implementations hop to their UI
/// thread when needed.
pub trait RenderSurface: PlatformSendSync {
    /// Bind the engine render context to this surface.
    fn attach_render_target(&self);

    /// Ask the surface to draw the latest frame.
    fn request_redraw(&self);

    /// Resize the drawable area, in points.
    fn set_size(&self, width: f64, height: f64);

    /// Match the surface's vertical-sync target to `fps` frames per second.
    fn set_preferred_frame_rate(&self, fps: u32);
}

/// Source of the current display refresh rate.
pub trait DisplayInfo: PlatformSendSync {
    /// Current refresh rate in Hz. `0` means unknown.
    fn refresh_rate(&self) -> u32;

    /// Refresh rate with the platform fallback applied.
    fn refresh_rate_or_default(&self) -> u32 {
        match self.refresh_rate() {
            0 => FALLBACK_REFRESH_RATE,
            rate => rate,
        }
    }
}

/// Display with a fixed, known refresh rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDisplay {
    pub refresh_rate: u32,
}

impl FixedDisplay {
    pub fn new(refresh_rate: u32) -> Self {
        Self { refresh_rate }
    }
}

impl Default for FixedDisplay {
    fn default() -> Self {
        Self::new(FALLBACK_REFRESH_RATE)
    }
}

impl DisplayInfo for FixedDisplay {
    fn refresh_rate(&self) -> u32 {
        self.refresh_rate
    }
}
