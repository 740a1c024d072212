//! OBS WebSocket facade over obws

use async_trait::async_trait;
use obws::requests::inputs::{InputId, SetSettings, Volume};
use obws::requests::scenes::SceneId;
use obws::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AudioConfig, ObsConfig};
use crate::error::{ObsError, Result};
use crate::obs::{ObsConnect, ObsControl, BACKGROUND_MUSIC_SOURCE};

/// Number of volume steps in a duck/restore fade
const FADE_STEPS: u32 = 10;

/// OBS WebSocket client implementing the control facade
pub struct ObsFacade {
    client: Client,
    audio: AudioConfig,
}

impl ObsFacade {
    /// Connect to the OBS WebSocket server and verify the connection
    pub async fn connect(config: &ObsConfig, audio: &AudioConfig) -> Result<Self> {
        tracing::debug!("Connecting to OBS at {}:{}", config.host, config.port);

        let client = Client::connect(&config.host, config.port, config.password.clone())
            .await
            .map_err(|e| ObsError::Connection(e.to_string()))?;

        let version = client
            .general()
            .version()
            .await
            .map_err(|e| ObsError::Connection(format!("Failed to get OBS version: {}", e)))?;

        tracing::info!(
            "Connected to OBS {} (WebSocket {})",
            version.obs_version.to_string(),
            version.obs_web_socket_version.to_string()
        );

        Ok(Self {
            client,
            audio: audio.clone(),
        })
    }

    async fn set_source_enabled(&self, scene: &str, source: &str, enabled: bool) -> Result<bool> {
        // A missing source reads as "not present in this scene", not an error
        let item_id = match self
            .client
            .scene_items()
            .id(obws::requests::scene_items::Id {
                scene: SceneId::Name(scene),
                source,
                search_offset: None,
            })
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!("Source '{}' not found in '{}': {}", source, scene, e);
                return Ok(false);
            }
        };

        self.client
            .scene_items()
            .set_enabled(obws::requests::scene_items::SetEnabled {
                scene: SceneId::Name(scene),
                item_id,
                enabled,
            })
            .await
            .map_err(|e| ObsError::Request(format!("set_enabled {}/{}: {}", scene, source, e)))?;

        Ok(true)
    }

    /// Fade the BGM input linearly between two volume multipliers
    async fn fade_bgm(&self, from: f32, to: f32) -> Result<()> {
        let step_delay = Duration::from_secs_f64(self.audio.duck_fade_secs / FADE_STEPS as f64);
        for step in 1..=FADE_STEPS {
            let t = step as f32 / FADE_STEPS as f32;
            let volume = from + (to - from) * t;
            self.set_bgm_volume(volume).await?;
            tokio::time::sleep(step_delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl ObsControl for ObsFacade {
    async fn switch_scene(&self, scene: &str) -> Result<()> {
        tracing::debug!("Switching scene to {}", scene);
        self.client
            .scenes()
            .set_current_program_scene(SceneId::Name(scene))
            .await
            .map_err(|e| ObsError::SceneNotFound(format!("{}: {}", scene, e)))?;
        Ok(())
    }

    async fn switch_scene_smooth(
        &self,
        scene: &str,
        transition: &str,
        duration_ms: u32,
    ) -> Result<()> {
        tracing::debug!(
            "Smooth-switching scene to {} using {} ({} ms)",
            scene,
            transition,
            duration_ms
        );

        self.client
            .transitions()
            .set_current(transition)
            .await
            .map_err(|e| ObsError::Request(format!("set transition {}: {}", transition, e)))?;
        self.client
            .transitions()
            .set_current_duration(time::Duration::milliseconds(duration_ms as i64))
            .await
            .map_err(|e| ObsError::Request(format!("set transition duration: {}", e)))?;

        self.client
            .scenes()
            .set_current_program_scene(SceneId::Name(scene))
            .await
            .map_err(|e| ObsError::SceneNotFound(format!("{}: {}", scene, e)))?;
        Ok(())
    }

    async fn show_source(&self, scene: &str, source: &str) -> Result<bool> {
        self.set_source_enabled(scene, source, true).await
    }

    async fn hide_source(&self, scene: &str, source: &str) -> Result<bool> {
        self.set_source_enabled(scene, source, false).await
    }

    async fn media_duration(&self, source: &str) -> Result<Duration> {
        let status = self
            .client
            .media_inputs()
            .status(InputId::Name(source))
            .await
            .map_err(|e| ObsError::Request(format!("media status {}: {}", source, e)))?;

        match status.duration {
            Some(duration) if duration.is_positive() => {
                Ok(Duration::from_secs_f64(duration.as_seconds_f64()))
            }
            _ => {
                tracing::debug!("OBS did not report a duration for input '{}'", source);
                Ok(Duration::ZERO)
            }
        }
    }

    async fn set_bgm_volume(&self, volume: f32) -> Result<()> {
        self.client
            .inputs()
            .set_volume(InputId::Name(BACKGROUND_MUSIC_SOURCE), Volume::Mul(volume))
            .await
            .map_err(|e| ObsError::Request(format!("set BGM volume: {}", e)))?;
        Ok(())
    }

    async fn duck_background_music(&self) -> Result<()> {
        tracing::debug!("Ducking background music");
        self.fade_bgm(self.audio.bgm_volume_normal, self.audio.bgm_volume_ducked)
            .await
    }

    async fn restore_background_music(&self) -> Result<()> {
        tracing::debug!("Restoring background music");
        self.fade_bgm(self.audio.bgm_volume_ducked, self.audio.bgm_volume_normal)
            .await
    }

    async fn update_audio_source_file(&self, source: &str, file_path: &str) -> Result<()> {
        tracing::debug!("Pointing '{}' at {}", source, file_path);
        let settings = serde_json::json!({ "local_file": file_path });
        self.client
            .inputs()
            .set_settings(SetSettings {
                input: InputId::Name(source),
                settings: &settings,
                overlay: Some(true),
            })
            .await
            .map_err(|e| ObsError::Request(format!("set settings {}: {}", source, e)))?;
        Ok(())
    }
}

/// Connector producing a fresh [`ObsFacade`] per call
pub struct WebSocketConnector {
    obs: ObsConfig,
    audio: AudioConfig,
}

impl WebSocketConnector {
    pub fn new(obs: &ObsConfig, audio: &AudioConfig) -> Self {
        Self {
            obs: obs.clone(),
            audio: audio.clone(),
        }
    }
}

#[async_trait]
impl ObsConnect for WebSocketConnector {
    async fn connect(&self) -> Result<Arc<dyn ObsControl>> {
        let facade = ObsFacade::connect(&self.obs, &self.audio).await?;
        Ok(Arc::new(facade))
    }
}
