//! # Player Items
//!
//! The media a player loads: a primary URL plus the audio and subtitle
//! sources that can be sideloaded next to it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The primary kind of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Audio,
}

/// An audio source that can be loaded next to the primary media,
/// e.g. a commentary track or a dub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioAsset {
    /// Unique identifier, caller-supplied or generated.
    pub id: String,
    /// Display name, e.g. "Director's Commentary".
    pub label: String,
    /// Language code, e.g. "en".
    pub code: String,
    pub url: String,
}

impl AudioAsset {
    pub fn new(label: impl Into<String>, code: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            code: code.into(),
            url: url.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A subtitle file (.srt, .vtt, .ass, ...) that can be sideloaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subtitle {
    pub id: String,
    pub label: String,
    /// Language code, e.g. "en" or "eng".
    pub code: String,
    pub url: String,
}

impl Subtitle {
    pub fn new(label: impl Into<String>, code: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            code: code.into(),
            url: url.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Label with the language code, for menus.
    pub fn description(&self) -> String {
        format!("{} ({})", self.label, self.code)
    }
}

/// The assets played by a player. Immutable once built; replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerItem {
    url: String,
    kind: AssetKind,
    audio_assets: Vec<AudioAsset>,
    subtitles: Vec<Subtitle>,
}

impl PlayerItem {
    /// A video item with optional sideloadable audio and subtitles.
    pub fn video(
        url: impl Into<String>,
        audio_assets: Vec<AudioAsset>,
        subtitles: Vec<Subtitle>,
    ) -> Self {
        Self {
            url: url.into(),
            kind: AssetKind::Video,
            audio_assets,
            subtitles,
        }
    }

    /// An audio-only item. Audio-only items carry no sideloadable assets.
    pub fn audio(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: AssetKind::Audio,
            audio_assets: Vec::new(),
            subtitles: Vec::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn is_video(&self) -> bool {
        self.kind == AssetKind::Video
    }

    pub fn audio_assets(&self) -> &[AudioAsset] {
        &self.audio_assets
    }

    pub fn subtitles(&self) -> &[Subtitle] {
        &self.subtitles
    }

    pub fn audio_asset(&self, id: &str) -> Option<&AudioAsset> {
        self.audio_assets.iter().find(|asset| asset.id == id)
    }

    pub fn subtitle(&self, id: &str) -> Option<&Subtitle> {
        self.subtitles.iter().find(|subtitle| subtitle.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = AudioAsset::new("Commentary", "en", "https://cdn/a.m4a");
        let b = AudioAsset::new("Commentary", "en", "https://cdn/a.m4a");
        assert_ne!(a.id, b.id);

        let sub = Subtitle::new("English", "en", "https://cdn/en.srt").with_id("en");
        assert_eq!(sub.id, "en");
        assert_eq!(sub.description(), "English (en)");
    }

    #[test]
    fn test_item_lookup() {
        let item = PlayerItem::video(
            "https://cdn/movie.mkv",
            vec![AudioAsset::new("Dub", "de", "https://cdn/de.m4a").with_id("dub")],
            vec![Subtitle::new("French", "fr", "https://cdn/fr.vtt").with_id("fr")],
        );

        assert!(item.is_video());
        assert_eq!(item.audio_asset("dub").map(|a| a.code.as_str()), Some("de"));
        assert_eq!(item.subtitle("fr").map(|s| s.label.as_str()), Some("French"));
        assert!(item.audio_asset("fr").is_none());
    }

    #[test]
    fn test_audio_item_has_no_assets() {
        let item = PlayerItem::audio("https://cdn/song.flac");
        assert_eq!(item.kind(), AssetKind::Audio);
        assert!(item.audio_assets().is_empty());
        assert!(item.subtitles().is_empty());
    }

    #[test]
    fn test_item_serialization() {
        let item = PlayerItem::audio("file:///music/song.flac");
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"kind\":\"audio\""));
        let back: PlayerItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
