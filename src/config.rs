//! Configuration parsing and management for EchoBot

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, EchoBotError};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub obs: ObsConfig,
    pub audio: AudioConfig,
    pub media: MediaConfig,
    pub flow: FlowConfig,
    pub ama: AmaConfig,
    pub events: EventsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            obs: ObsConfig::default(),
            audio: AudioConfig::default(),
            media: MediaConfig::default(),
            flow: FlowConfig::default(),
            ama: AmaConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EchoBotError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(s: &str) -> Result<Self, EchoBotError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, EchoBotError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), EchoBotError> {
        if self.obs.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "obs.port".to_string(),
                message: "Port must be greater than 0".to_string(),
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.audio.bgm_volume_normal) {
            return Err(ConfigError::InvalidValue {
                field: "audio.bgm_volume_normal".to_string(),
                message: "Volume must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.audio.bgm_volume_ducked) {
            return Err(ConfigError::InvalidValue {
                field: "audio.bgm_volume_ducked".to_string(),
                message: "Volume must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }

        if self.audio.bgm_volume_ducked > self.audio.bgm_volume_normal {
            return Err(ConfigError::InvalidValue {
                field: "audio.bgm_volume_ducked".to_string(),
                message: "Ducked volume must not exceed normal volume".to_string(),
            }
            .into());
        }

        if self.flow.dj_total_duration <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "flow.dj_total_duration".to_string(),
                message: "Total duration must be greater than 0".to_string(),
            }
            .into());
        }

        if !self.flow.playlist_path.exists() {
            tracing::warn!(
                "Playlist file not found at: {}",
                self.flow.playlist_path.display()
            );
        }

        if !self.flow.schedule_path.exists() {
            tracing::warn!(
                "Schedule file not found at: {}",
                self.flow.schedule_path.display()
            );
        }

        Ok(())
    }
}

/// OBS WebSocket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObsConfig {
    /// OBS WebSocket host
    pub host: String,
    /// OBS WebSocket port
    pub port: u16,
    /// OBS WebSocket password (optional)
    pub password: Option<String>,
    /// Default scene transition name for smooth switches
    pub transition: String,
    /// Default scene transition duration in milliseconds
    pub transition_ms: u32,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4455,
            password: None,
            transition: "Fade".to_string(),
            transition_ms: 500,
        }
    }
}

/// Background music levels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// BGM volume multiplier while no foreground voice plays
    pub bgm_volume_normal: f32,
    /// BGM volume multiplier while voice audio plays
    pub bgm_volume_ducked: f32,
    /// Duration of the duck/restore fade in seconds
    pub duck_fade_secs: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            bgm_volume_normal: 0.3,
            bgm_volume_ducked: 0.01,
            duck_fade_secs: 1.0,
        }
    }
}

/// Media directory layout.
///
/// All generated media lives under a single root. When the service runs in a
/// container but OBS runs on the host, `host_dir` maps container paths to the
/// paths OBS can actually open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Media root as seen by OBS on the host (optional; unset when both run
    /// in the same environment)
    pub host_dir: Option<PathBuf>,
    /// Media root as seen by this process
    pub container_dir: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            host_dir: None,
            container_dir: PathBuf::from("/app/media"),
        }
    }
}

impl MediaConfig {
    /// Directory holding generated voice audio (news bulletins, AMA replies)
    pub fn voice_output_dir(&self) -> PathBuf {
        self.container_dir.join("voice").join("generated_audio")
    }

    /// Directory holding the answered-chat memory store
    pub fn memory_output_dir(&self) -> PathBuf {
        self.container_dir.join("memory")
    }
}

/// Playlist driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Path to the playlist JSON document
    pub playlist_path: PathBuf,
    /// Path to the schedule JSON document
    pub schedule_path: PathBuf,
    /// Total wall-clock budget for a location-cycling item, in seconds.
    /// Also injected into the playlist variables table as `dj_duration`.
    pub dj_total_duration: f64,
    /// Default seconds per location when the playlist does not specify one
    pub dj_location_switch_duration: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            playlist_path: PathBuf::from("config/playlist.json"),
            schedule_path: PathBuf::from("config/schedule.json"),
            dj_total_duration: 1800.0,
            dj_location_switch_duration: 30.0,
        }
    }
}

/// AMA (ask-me-anything) reply generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmaConfig {
    /// Enable AMA reply generation on the working scene
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible chat completion endpoint
    pub chat_api_base: String,
    /// API key for the chat endpoint
    pub chat_api_key: Option<String>,
    /// Chat model identifier
    pub chat_model: String,
    /// ElevenLabs API key
    pub elevenlabs_api_key: Option<String>,
    /// ElevenLabs voice identifier
    pub elevenlabs_voice_id: Option<String>,
    /// ElevenLabs model identifier
    pub elevenlabs_model_id: String,
    /// File holding the agent personality text embedded in reply prompts
    pub personality_path: Option<PathBuf>,
}

impl Default for AmaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chat_api_base: "https://api.openai.com/v1".to_string(),
            chat_api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            elevenlabs_api_key: None,
            elevenlabs_voice_id: None,
            elevenlabs_model_id: "eleven_multilingual_v2".to_string(),
            personality_path: None,
        }
    }
}

/// Event webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Webhook URLs notified of stream events (empty disables notification)
    pub webhook_urls: Vec<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            webhook_urls: Vec::new(),
            timeout_secs: 5,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("echobot");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/echobot");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/echobot");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("echobot");
        }
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.obs.host, "127.0.0.1");
        assert_eq!(config.obs.port, 4455);
        assert_eq!(config.audio.bgm_volume_normal, 0.3);
        assert_eq!(config.audio.bgm_volume_ducked, 0.01);
        assert_eq!(config.flow.dj_total_duration, 1800.0);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [obs]
            host = "10.0.0.5"
            port = 4456
            transition = "Cut"

            [audio]
            bgm_volume_ducked = 0.05

            [flow]
            dj_total_duration = 600.0
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.obs.host, "10.0.0.5");
        assert_eq!(config.obs.port, 4456);
        assert_eq!(config.obs.transition, "Cut");
        assert_eq!(config.audio.bgm_volume_ducked, 0.05);
        assert_eq!(config.flow.dj_total_duration, 600.0);
    }

    #[test]
    fn test_ducked_above_normal_rejected() {
        let toml = r#"
            [audio]
            bgm_volume_normal = 0.1
            bgm_volume_ducked = 0.5
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_media_dirs_derive_from_root() {
        let config = MediaConfig {
            host_dir: None,
            container_dir: PathBuf::from("/data/media"),
        };
        assert_eq!(
            config.voice_output_dir(),
            PathBuf::from("/data/media/voice/generated_audio")
        );
        assert_eq!(
            config.memory_output_dir(),
            PathBuf::from("/data/media/memory")
        );
    }
}
