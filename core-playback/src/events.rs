//! # Player Events
//!
//! Notifications published on the player's [`EventBus`](core_runtime::EventBus).
//! Every event is emitted from the observing context, after the published
//! state it describes has been updated.

use crate::item::AssetKind;
use crate::status::TimeControlStatus;
use crate::tracks::DiscoveredTrack;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// A new item replaced the current one; selection and discovery were cleared.
    ItemReplaced { url: String, kind: AssetKind },
    /// The engine opened the current file.
    FileLoaded,
    /// The discovered track snapshot was recomputed.
    TracksChanged { tracks: Vec<DiscoveredTrack> },
    AudioTrackChanged { id: Option<String> },
    SubtitleChanged { id: Option<String> },
    TimeControlStatusChanged { status: TimeControlStatus },
    /// Playback reached the end of the media. Emitted once per reach-end.
    DidPlayToEndTime,
    /// A load never reported the file as opened within the configured bound.
    LoadTimedOut { generation: u64 },
}

impl PlayerEvent {
    /// Short name, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::ItemReplaced { .. } => "item-replaced",
            PlayerEvent::FileLoaded => "file-loaded",
            PlayerEvent::TracksChanged { .. } => "tracks-changed",
            PlayerEvent::AudioTrackChanged { .. } => "audio-track-changed",
            PlayerEvent::SubtitleChanged { .. } => "subtitle-changed",
            PlayerEvent::TimeControlStatusChanged { .. } => "time-control-status-changed",
            PlayerEvent::DidPlayToEndTime => "did-play-to-end-time",
            PlayerEvent::LoadTimedOut { .. } => "load-timed-out",
        }
    }
}
