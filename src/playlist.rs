//! Playlist loading and variable resolution
//!
//! The playlist is a JSON document: an ordered list of scene items replayed
//! forever by the driver, plus a variables table for symbolic durations
//! (`"duration": "$dj_duration"`). Variables are resolved once at load time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{EchoBotError, PlaylistError};

/// One step in the eternal show rotation
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistItem {
    /// Logical scene identifier (resolved against the schedule)
    pub scene_name: String,
    /// Explicit duration in seconds; `None` derives it from media
    pub duration: Option<f64>,
    /// Sources rotated within the scene
    pub media_sources: Option<Vec<String>>,
    /// Timing for the media-source rotation
    pub media_source_cycle: Option<MediaSourceCycle>,
    /// Two-level location rotation; takes priority over `media_sources`
    pub location_config: Option<LocationConfig>,
}

/// Timing for a media-source rotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSourceCycle {
    /// Seconds each source stays visible
    pub duration: f64,
    /// Stop-signal polling interval in seconds
    pub poll_interval: f64,
}

impl Default for MediaSourceCycle {
    fn default() -> Self {
        Self {
            duration: 10.0,
            poll_interval: 0.1,
        }
    }
}

/// A location: a mini-scene with its own source pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Real OBS scene name
    pub scene: String,
    /// Sources rotated while this location is live
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Two-level location rotation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub locations: Vec<Location>,
    /// Seconds per location; falls back to the flow config default
    pub location_switch_duration: Option<f64>,
    /// Seconds between source switches within a location
    pub media_source_cycle_duration: Option<f64>,
}

/// The loaded, variable-resolved playlist
#[derive(Debug, Clone)]
pub struct Playlist {
    items: Vec<PlaylistItem>,
}

impl Playlist {
    /// Load the playlist from a JSON file.
    ///
    /// `dj_duration_override` is injected into the variables table as
    /// `dj_duration` before substitution, so the flow config controls the
    /// total DJ-segment budget regardless of what the file says.
    pub fn load<P: AsRef<Path>>(
        path: P,
        dj_duration_override: Option<f64>,
    ) -> Result<Self, EchoBotError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PlaylistError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&contents, dj_duration_override)
    }

    /// Parse a playlist document from a JSON string
    pub fn from_json(
        s: &str,
        dj_duration_override: Option<f64>,
    ) -> Result<Self, EchoBotError> {
        let doc: RawDocument =
            serde_json::from_str(s).map_err(|e| PlaylistError::Parse(e.to_string()))?;

        let mut variables = doc.variables;
        if let Some(total) = dj_duration_override {
            variables.insert("dj_duration".to_string(), total);
        }

        let mut items = Vec::with_capacity(doc.playlist.len());
        for raw in doc.playlist {
            let duration = match raw.duration {
                None => None,
                Some(RawDuration::Seconds(secs)) => Some(secs),
                Some(RawDuration::Variable(name)) => {
                    let var_name = name.strip_prefix('$').unwrap_or(&name);
                    Some(
                        *variables
                            .get(var_name)
                            .ok_or_else(|| {
                                PlaylistError::UnknownVariable(var_name.to_string())
                            })?,
                    )
                }
            };
            items.push(PlaylistItem {
                scene_name: raw.scene_name,
                duration,
                media_sources: raw.media_sources,
                media_source_cycle: raw.media_source_cycle,
                location_config: raw.location_config,
            });
        }

        if items.is_empty() {
            return Err(PlaylistError::Empty.into());
        }

        Ok(Self { items })
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub fn from_items(items: Vec<PlaylistItem>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    variables: HashMap<String, f64>,
    #[serde(default)]
    playlist: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    scene_name: String,
    #[serde(default)]
    duration: Option<RawDuration>,
    #[serde(default)]
    media_sources: Option<Vec<String>>,
    #[serde(default)]
    media_source_cycle: Option<MediaSourceCycle>,
    #[serde(default)]
    location_config: Option<LocationConfig>,
}

/// A duration is either a number of seconds or a `$variable` reference
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(f64),
    Variable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "variables": { "dj_duration": 900 },
        "playlist": [
            { "scene_name": "talking", "duration": 5 },
            { "scene_name": "dj_visual_only",
              "duration": "$dj_duration",
              "media_sources": ["DJ_Video_1", "DJ_Video_2"],
              "media_source_cycle": { "duration": 8.0 } },
            { "scene_name": "ai_robotics_news" }
        ]
    }"#;

    #[test]
    fn test_parse_and_resolve_variables() {
        let playlist = Playlist::from_json(DOC, None).unwrap();
        assert_eq!(playlist.len(), 3);
        assert_eq!(playlist.items()[0].duration, Some(5.0));
        assert_eq!(playlist.items()[1].duration, Some(900.0));
        assert_eq!(playlist.items()[2].duration, None);
    }

    #[test]
    fn test_override_wins_over_file_variable() {
        let playlist = Playlist::from_json(DOC, Some(1800.0)).unwrap();
        assert_eq!(playlist.items()[1].duration, Some(1800.0));
    }

    #[test]
    fn test_media_source_cycle_defaults() {
        let playlist = Playlist::from_json(DOC, None).unwrap();
        let cycle = playlist.items()[1].media_source_cycle.as_ref().unwrap();
        assert_eq!(cycle.duration, 8.0);
        assert_eq!(cycle.poll_interval, 0.1);
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let doc = r#"{
            "playlist": [ { "scene_name": "talking", "duration": "$missing" } ]
        }"#;
        assert!(Playlist::from_json(doc, None).is_err());
    }

    #[test]
    fn test_empty_playlist_rejected() {
        let doc = r#"{ "playlist": [] }"#;
        assert!(Playlist::from_json(doc, None).is_err());
    }

    #[test]
    fn test_location_config_parses() {
        let doc = r#"{
            "playlist": [
                { "scene_name": "dj_locations",
                  "location_config": {
                    "locations": [
                        { "scene": "DJ-Beach", "sources": ["Beach_1", "Beach_2"] },
                        { "scene": "DJ-Club" }
                    ],
                    "location_switch_duration": 30,
                    "media_source_cycle_duration": 10
                  } }
            ]
        }"#;
        let playlist = Playlist::from_json(doc, None).unwrap();
        let cfg = playlist.items()[0].location_config.as_ref().unwrap();
        assert_eq!(cfg.locations.len(), 2);
        assert_eq!(cfg.locations[0].sources.len(), 2);
        assert!(cfg.locations[1].sources.is_empty());
        assert_eq!(cfg.location_switch_duration, Some(30.0));
    }
}
