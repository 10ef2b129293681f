//! # Engine Startup Options
//!
//! The fixed option table applied to every engine before initialization.
//! Entries flagged as disabled are only applied when the host overrides them
//! through [`PlaybackConfig::option_overrides`](crate::config::PlaybackConfig).

use crate::config::PlaybackConfig;

/// One row of the startup option table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOption {
    pub name: &'static str,
    pub default: &'static str,
    pub enabled_by_default: bool,
}

const fn enabled(name: &'static str, default: &'static str) -> EngineOption {
    EngineOption {
        name,
        default,
        enabled_by_default: true,
    }
}

const fn disabled(name: &'static str, default: &'static str) -> EngineOption {
    EngineOption {
        name,
        default,
        enabled_by_default: false,
    }
}

/// Option applied when a render surface is attached rather than at startup.
pub const GPU_API: EngineOption = disabled("gpu-api", "opengl");

/// GLES is not available on macOS.
const OPENGL_ES: EngineOption = EngineOption {
    name: "opengl-es",
    default: "yes",
    enabled_by_default: !cfg!(target_os = "macos"),
};

pub const STARTUP_OPTIONS: &[EngineOption] = &[
    // Cache
    enabled("cache-pause-initial", "no"),
    enabled("cache-secs", "120"),
    enabled("cache-pause-wait", "3"),
    enabled("keep-open", "yes"),
    enabled("deinterlace", "no"),
    // Subtitles
    enabled("sub-scale", "1.0"),
    enabled("sub-color", "#FFFFFF"),
    // Network
    enabled(
        "user-agent",
        "Mozilla/5.0 (compatible; MSIE 9.0; Windows NT 6.1; Trident/5.0)",
    ),
    // Sync and frame timing
    enabled("initial-audio-sync", "yes"),
    disabled("opengl-swapinterval", "1"),
    disabled("video-sync", "display-resample"),
    disabled("interpolation", "yes"),
    disabled("tscale", "mitchell"),
    disabled("tscale-window", "blackman"),
    disabled("vd-lavc-framedrop", "nonref"),
    // Decoding and output
    enabled("hwdec", "auto-safe"),
    enabled("vo", "libmpv"),
    GPU_API,
    OPENGL_ES,
    enabled("dither", "ordered"),
    // Demuxers
    enabled("demuxer", "lavf"),
    enabled("audio-demuxer", "lavf"),
    enabled("sub-demuxer", "lavf"),
    enabled("demuxer-lavf-analyzeduration", "1"),
    enabled("demuxer-lavf-probe-info", "no"),
];

/// The value to use for `option`, honoring overrides. `None` when the option
/// is disabled and not overridden.
pub fn option_value(option: &EngineOption, config: &PlaybackConfig) -> Option<String> {
    match config.option_overrides.get(option.name) {
        Some(value) => Some(value.clone()),
        None if option.enabled_by_default => Some(option.default.to_string()),
        None => None,
    }
}

/// GPU API applied when a render surface is attached.
pub fn surface_gpu_api(config: &PlaybackConfig) -> String {
    option_value(&GPU_API, config).unwrap_or_else(|| GPU_API.default.to_string())
}

/// Ordered `(name, value)` pairs applied before engine initialization.
pub fn resolve_startup_options(config: &PlaybackConfig, cpu_count: usize) -> Vec<(String, String)> {
    let mut resolved = Vec::with_capacity(STARTUP_OPTIONS.len() + 4 + config.extra_options.len());

    if cfg!(target_os = "macos") {
        resolved.push(("input-media-keys".to_string(), "yes".to_string()));
    }

    for option in STARTUP_OPTIONS {
        if option.name == GPU_API.name {
            continue;
        }
        if let Some(value) = option_value(option, config) {
            resolved.push((option.name.to_string(), value));
        }
    }

    resolved.push((
        "vd-lavc-threads".to_string(),
        (cpu_count.max(1) * 2).to_string(),
    ));

    if cfg!(target_os = "macos") {
        resolved.push(("ytdl".to_string(), "no".to_string()));
    }

    for (name, value) in &config.extra_options {
        resolved.push((name.clone(), value.clone()));
    }

    resolved
}
