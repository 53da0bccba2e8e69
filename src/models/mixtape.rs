//! Mixtape document model
//!
//! Documents are stored one JSON file per mixtape. Older files may carry
//! legacy fields (`saved_at`, per-track `title`); those are migrated in a
//! single [`Mixtape::normalize`] step on read. Keys the schema does not know
//! about are preserved round-trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::dates::now_timestamp;

/// One entry in a mixtape's ordered track list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixtapeTrack {
    /// Library-root-relative path of the source file
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub filename: String,

    #[serde(default)]
    pub artist: String,

    #[serde(default)]
    pub album: String,

    /// Track title (legacy documents call this `title`)
    #[serde(default)]
    pub track: String,

    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub cover: Option<String>,

    /// Unknown keys, preserved round-trip
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A mixtape document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mixtape {
    #[serde(default)]
    pub title: String,

    /// URL-safe identity, derived from the title; unique across the store
    #[serde(default)]
    pub slug: String,

    /// External identity used to resolve create-or-update
    #[serde(default)]
    pub client_id: Option<String>,

    /// Data URL on input, `covers/<slug>.jpg` (or an opaque reference) on output
    #[serde(default)]
    pub cover: Option<String>,

    #[serde(default)]
    pub liner_notes: String,

    #[serde(default)]
    pub tracks: Vec<MixtapeTrack>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,

    // Gift-flow presentation fields, opaque to the core
    #[serde(default)]
    pub creator_name: String,

    #[serde(default)]
    pub gift_flow_enabled: bool,

    #[serde(default = "default_unwrap_style")]
    pub unwrap_style: String,

    #[serde(default = "default_true")]
    pub show_tracklist_after_completion: bool,

    /// Unknown keys, preserved round-trip
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Mixtape {
    fn default() -> Self {
        Self {
            title: String::new(),
            slug: String::new(),
            client_id: None,
            cover: None,
            liner_notes: String::new(),
            tracks: Vec::new(),
            created_at: None,
            updated_at: None,
            creator_name: String::new(),
            gift_flow_enabled: false,
            unwrap_style: default_unwrap_style(),
            show_tracklist_after_completion: true,
            extra: Map::new(),
        }
    }
}

impl Mixtape {
    /// Migrate legacy fields and fill schema defaults.
    ///
    /// Applied once whenever a document is read back: legacy `saved_at`
    /// becomes `updated_at`, legacy per-track `title` becomes `track`, and a
    /// missing `updated_at` falls back to `created_at` (or now). After this,
    /// `created_at <= updated_at` holds whenever both are set.
    pub fn normalize(&mut self) {
        for track in &mut self.tracks {
            if track.track.is_empty() {
                if let Some(Value::String(title)) = track.extra.remove("title") {
                    track.track = title;
                }
            }
        }

        if self.updated_at.is_none() {
            if let Some(Value::String(saved_at)) = self.extra.remove("saved_at") {
                self.updated_at = Some(saved_at);
            }
        }

        if self.updated_at.is_none() {
            self.updated_at = Some(
                self.created_at
                    .clone()
                    .unwrap_or_else(now_timestamp),
            );
        }
    }

    /// Sort key for listings: most recently written first
    pub fn recency_key(&self) -> (String, String) {
        (
            self.updated_at.clone().unwrap_or_default(),
            self.created_at.clone().unwrap_or_default(),
        )
    }
}

fn default_unwrap_style() -> String {
    "playful".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_filled_on_read() {
        let doc: Mixtape = serde_json::from_str(r#"{"title": "Summer"}"#).unwrap();
        assert_eq!(doc.title, "Summer");
        assert_eq!(doc.liner_notes, "");
        assert_eq!(doc.unwrap_style, "playful");
        assert!(doc.show_tracklist_after_completion);
        assert!(doc.client_id.is_none());
    }

    #[test]
    fn test_legacy_saved_at_migrates() {
        let mut doc: Mixtape =
            serde_json::from_str(r#"{"title": "Old", "saved_at": "2021-01-01T00:00:00Z"}"#)
                .unwrap();
        doc.normalize();
        assert_eq!(doc.updated_at.as_deref(), Some("2021-01-01T00:00:00Z"));
        assert!(!doc.extra.contains_key("saved_at"));
    }

    #[test]
    fn test_legacy_track_title_migrates() {
        let mut doc: Mixtape = serde_json::from_str(
            r#"{"title": "Old", "tracks": [{"path": "a.mp3", "title": "Song"}]}"#,
        )
        .unwrap();
        doc.normalize();
        assert_eq!(doc.tracks[0].track, "Song");
        assert!(!doc.tracks[0].extra.contains_key("title"));
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let raw = r#"{"title": "X", "some_future_field": 42}"#;
        let doc: Mixtape = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.extra["some_future_field"], 42);

        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["some_future_field"], 42);
    }

    #[test]
    fn test_normalize_backfills_updated_at() {
        let mut doc = Mixtape {
            created_at: Some("2022-05-05T00:00:00Z".to_string()),
            ..Default::default()
        };
        doc.normalize();
        assert_eq!(doc.updated_at.as_deref(), Some("2022-05-05T00:00:00Z"));
    }
}
