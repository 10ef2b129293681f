//! Point-in-time playback diagnostics read straight from engine properties.

use crate::client::EngineClient;
use serde::Serialize;

/// Snapshot of decoder, output and cache state. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackMetrics {
    // Video
    pub hardware_decoder: String,
    pub video_format: String,
    pub video_codec: String,
    pub video_output: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub video_bitrate: f64,
    pub output_fps: f64,
    pub container_fps: f64,
    pub dropped_frames: i64,

    // Audio
    pub audio_format: String,
    pub audio_codec: String,
    pub audio_output: String,
    pub audio_channels: String,
    pub audio_sample_rate: String,

    // Cache
    pub buffer_state: i64,
    pub cache_duration: f64,
    pub paused_for_cache: bool,

    /// `-1` when the engine reports a count that cannot be parsed.
    pub track_count: i64,
}

impl PlaybackMetrics {
    pub fn collect(client: &EngineClient) -> Self {
        Self {
            hardware_decoder: client.get_string_or_unknown("hwdec-current"),
            video_format: client.get_string_or_unknown("video-format"),
            video_codec: client.get_string_or_unknown("video-codec"),
            video_output: client.get_string_or_unknown("current-vo"),
            width: parse_int(client.get_string("width")),
            height: parse_int(client.get_string("height")),
            video_bitrate: client.get_double("video-bitrate"),
            output_fps: client.get_double("estimated-vf-fps"),
            container_fps: client.get_double("container-fps"),
            dropped_frames: client.get_int("frame-drop-count"),

            audio_format: client.get_string_or_unknown("audio-params/format"),
            audio_codec: client.get_string_or_unknown("audio-codec"),
            audio_output: client.get_string_or_unknown("current-ao"),
            audio_channels: client.get_string_or_unknown("audio-params/channels"),
            audio_sample_rate: client.get_string_or_unknown("audio-params/samplerate"),

            buffer_state: client.get_int("cache-buffering-state"),
            cache_duration: client.get_double("demuxer-cache-duration"),
            paused_for_cache: client.get_flag("paused-for-cache"),

            track_count: parse_int(client.get_string("track-list/count")).unwrap_or(-1),
        }
    }

    /// `width x height` when both are known.
    pub fn resolution(&self) -> Option<String> {
        Some(format!("{}x{}", self.width?, self.height?))
    }
}

fn parse_int(value: Option<String>) -> Option<i64> {
    value?.trim().parse().ok()
}
