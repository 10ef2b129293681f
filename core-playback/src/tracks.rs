//! # Track Registry
//!
//! Discovers the embedded tracks of the loaded file from the engine's
//! `track-list` properties and resolves selection requests against them and
//! against the sideloadable assets of the current [`PlayerItem`].
//!
//! A snapshot is always recomputed wholesale; entries the core cannot classify
//! (video tracks, unknown types) are dropped at discovery time.

use crate::client::EngineClient;
use crate::item::{AudioAsset, PlayerItem, Subtitle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Kind of an embedded track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Subtitle,
    Unknown,
}

impl TrackKind {
    /// Map an engine `track-list/N/type` value.
    pub fn from_engine(value: &str) -> Self {
        match value {
            "audio" => TrackKind::Audio,
            "sub" => TrackKind::Subtitle,
            _ => TrackKind::Unknown,
        }
    }
}

/// A track reported by the engine for the currently loaded file.
///
/// Identifiers are engine-assigned and only meaningful while the file that
/// produced them stays loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveredTrack {
    pub id: String,
    pub kind: TrackKind,
    pub language: Option<String>,
    pub title: Option<String>,
}

impl DiscoveredTrack {
    /// Label for menus: the title, else the capitalized language, else
    /// `Track {id}`.
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        if let Some(language) = self.language.as_deref().filter(|l| !l.is_empty()) {
            return capitalize_words(language);
        }
        format!("Track {}", self.id)
    }
}

fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Outcome of resolving a track selection request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    /// Switch in place by writing the engine id.
    Embedded(String),
    /// Requires reloading the file with the asset attached.
    Sideloaded(T),
    NotFound,
}

/// Reads and interprets the engine's track list.
pub struct TrackRegistry {
    client: Arc<EngineClient>,
}

impl TrackRegistry {
    pub fn new(client: Arc<EngineClient>) -> Self {
        Self { client }
    }

    /// Query the complete track list of the loaded file.
    pub fn fetch(&self) -> Vec<DiscoveredTrack> {
        let count = self.client.get_int("track-list/count").max(0);
        let mut tracks = Vec::with_capacity(count as usize);

        for index in 0..count {
            let kind = self
                .client
                .get_string(&format!("track-list/{index}/type"))
                .map(|value| TrackKind::from_engine(&value))
                .unwrap_or(TrackKind::Unknown);
            if kind == TrackKind::Unknown {
                continue;
            }

            let Some(id) = self.client.get_string(&format!("track-list/{index}/id")) else {
                continue;
            };
            if tracks.iter().any(|track: &DiscoveredTrack| track.id == id && track.kind == kind) {
                continue;
            }

            tracks.push(DiscoveredTrack {
                id,
                kind,
                language: self.client.get_string(&format!("track-list/{index}/lang")),
                title: self.client.get_string(&format!("track-list/{index}/title")),
            });
        }

        trace!(count = tracks.len(), "Track list fetched");
        tracks
    }

    /// Whether the loaded file carries any subtitle track.
    pub fn has_subtitle_tracks(&self) -> bool {
        let count = self.client.get_int("track-list/count").max(0);
        (0..count).any(|index| {
            self.client
                .get_string(&format!("track-list/{index}/type"))
                .is_some_and(|value| value == "sub")
        })
    }

    /// Resolve an audio selection: embedded first, then sideloaded.
    pub fn resolve_audio(
        id: &str,
        discovered: &[DiscoveredTrack],
        item: &PlayerItem,
    ) -> Resolution<AudioAsset> {
        if discovered
            .iter()
            .any(|track| track.kind == TrackKind::Audio && track.id == id)
        {
            return Resolution::Embedded(id.to_string());
        }
        match item.audio_asset(id) {
            Some(asset) => Resolution::Sideloaded(asset.clone()),
            None => Resolution::NotFound,
        }
    }

    /// Resolve a subtitle selection: embedded first, then sideloaded.
    pub fn resolve_subtitle(
        id: &str,
        discovered: &[DiscoveredTrack],
        item: &PlayerItem,
    ) -> Resolution<Subtitle> {
        if discovered
            .iter()
            .any(|track| track.kind == TrackKind::Subtitle && track.id == id)
        {
            return Resolution::Embedded(id.to_string());
        }
        match item.subtitle(id) {
            Some(subtitle) => Resolution::Sideloaded(subtitle.clone()),
            None => Resolution::NotFound,
        }
    }
}

/// First track of `kind` in a snapshot.
pub fn first_of_kind(tracks: &[DiscoveredTrack], kind: TrackKind) -> Option<&DiscoveredTrack> {
    tracks.iter().find(|track| track.kind == kind)
}
