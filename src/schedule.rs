//! Schedule loading, persistence, and runtime mutation
//!
//! The schedule maps logical scene names to resolved OBS scene metadata.
//! The driver reads it for scene/source names and writes discovered audio
//! paths back so later consumers see what is currently playing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{EchoBotError, ScheduleError};

/// Resolved metadata for one logical scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Real OBS scene name
    pub scene_name: String,
    /// Whether the scene plays its own voice/audio track
    #[serde(default)]
    pub has_audio: bool,
    /// Filename prefix of generated audio for this scene; presence marks the
    /// scene as a dynamically-generated segment gated on media readiness
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_topic: Option<String>,
    /// Video file backing the scene, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
    /// Whether the scene's video loops (non-looping videos bound the item
    /// duration)
    #[serde(default)]
    pub loop_video: bool,
    /// OBS source name of the scene's video input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_source_name: Option<String>,
    /// Default media sources to rotate when the playlist item names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_sources: Option<Vec<String>>,
    /// Discovered audio path as seen by this process (set at runtime)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path_env: Option<PathBuf>,
    /// Discovered audio path as seen by OBS on the host (set at runtime)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path_obs: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScheduleDocument {
    #[serde(rename = "_available_scenes")]
    available_scenes: HashMap<String, ScheduleEntry>,
}

/// The schedule: logical scene name → resolved entry
#[derive(Debug)]
pub struct Schedule {
    entries: HashMap<String, ScheduleEntry>,
    path: Option<PathBuf>,
}

impl Schedule {
    /// Load the schedule from a JSON file, remembering the path for save()
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EchoBotError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ScheduleError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;
        let doc: ScheduleDocument =
            serde_json::from_str(&contents).map_err(|e| ScheduleError::Parse(e.to_string()))?;
        Ok(Self {
            entries: doc.available_scenes,
            path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// Build an in-memory schedule (not backed by a file)
    pub fn from_entries(entries: HashMap<String, ScheduleEntry>) -> Self {
        Self {
            entries,
            path: None,
        }
    }

    /// Persist the schedule back to its file. No-op for in-memory schedules.
    pub fn save(&self) -> Result<(), EchoBotError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let doc = ScheduleDocument {
            available_scenes: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)
            .map_err(|e| ScheduleError::Save(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| ScheduleError::Save(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    pub fn get(&self, scene_name: &str) -> Option<&ScheduleEntry> {
        self.entries.get(scene_name)
    }

    pub fn get_mut(&mut self, scene_name: &str) -> Option<&mut ScheduleEntry> {
        self.entries.get_mut(scene_name)
    }

    /// Record a discovered audio artifact on a scene entry.
    ///
    /// Stores the environment-local path (used for duration measurement) and
    /// the OBS-facing host path (pushed into the voice source), and marks the
    /// entry as having audio.
    pub fn record_discovered_audio(
        &mut self,
        scene_name: &str,
        audio_path_env: PathBuf,
        audio_path_obs: String,
    ) -> Result<(), EchoBotError> {
        let entry = self
            .entries
            .get_mut(scene_name)
            .ok_or_else(|| ScheduleError::UnknownScene(scene_name.to_string()))?;
        entry.audio_path_env = Some(audio_path_env);
        entry.audio_path_obs = Some(audio_path_obs);
        entry.has_audio = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "_available_scenes": {
            "talking": {
                "scene_name": "Talking-Scene",
                "video_path": "videos/talking_loop.mp4",
                "loop_video": true,
                "video_source_name": "Talking_Video"
            },
            "ai_robotics_news": {
                "scene_name": "News-Scene",
                "audio_topic": "audio_ai_robotics"
            }
        }
    }"#;

    fn load_doc() -> Schedule {
        let doc: ScheduleDocument = serde_json::from_str(DOC).unwrap();
        Schedule::from_entries(doc.available_scenes)
    }

    #[test]
    fn test_parse_entries() {
        let schedule = load_doc();
        let talking = schedule.get("talking").unwrap();
        assert_eq!(talking.scene_name, "Talking-Scene");
        assert!(talking.loop_video);
        assert!(!talking.has_audio);
        assert!(talking.audio_topic.is_none());

        let news = schedule.get("ai_robotics_news").unwrap();
        assert_eq!(news.audio_topic.as_deref(), Some("audio_ai_robotics"));
    }

    #[test]
    fn test_record_discovered_audio() {
        let mut schedule = load_doc();
        schedule
            .record_discovered_audio(
                "ai_robotics_news",
                PathBuf::from("/app/media/voice/generated_audio/audio_ai_robotics_1.mp3"),
                "/host/media/voice/generated_audio/audio_ai_robotics_1.mp3".to_string(),
            )
            .unwrap();

        let news = schedule.get("ai_robotics_news").unwrap();
        assert!(news.has_audio);
        assert!(news.audio_path_env.is_some());
        assert_eq!(
            news.audio_path_obs.as_deref(),
            Some("/host/media/voice/generated_audio/audio_ai_robotics_1.mp3")
        );
    }

    #[test]
    fn test_record_unknown_scene_rejected() {
        let mut schedule = load_doc();
        let result = schedule.record_discovered_audio(
            "nonexistent",
            PathBuf::from("/tmp/a.mp3"),
            "/tmp/a.mp3".to_string(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        std::fs::write(&path, DOC).unwrap();

        let mut schedule = Schedule::load(&path).unwrap();
        schedule
            .record_discovered_audio(
                "ai_robotics_news",
                PathBuf::from("/app/media/a.mp3"),
                "/host/media/a.mp3".to_string(),
            )
            .unwrap();
        schedule.save().unwrap();

        let reloaded = Schedule::load(&path).unwrap();
        assert!(reloaded.get("ai_robotics_news").unwrap().has_audio);
    }
}
