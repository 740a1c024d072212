//! OBS control facade
//!
//! The driver and every cycler task talk to OBS through the [`ObsControl`]
//! trait; [`ObsConnect`] hands each background task its own connection
//! handle so handles are never shared across tasks.

pub mod client;

pub use client::{ObsFacade, WebSocketConnector};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Fixed source that plays generated voice audio in the news scene
pub const VOICE_MUSIC_SOURCE: &str = "Voice_Music_Source";

/// Background music input ducked while voice plays
pub const BACKGROUND_MUSIC_SOURCE: &str = "Background-Music";

/// Sources never handed to a media-source cycler, regardless of what the
/// playlist or schedule lists for the scene
pub const CYCLER_EXCLUDED_SOURCES: [&str; 3] = ["Background-Music", "glitch", "UTIL_LOGS"];

/// The OBS RPC surface the core needs.
///
/// Every call may fail on a transient connection error; callers treat a
/// failure as "this operation did not happen" and continue.
#[async_trait]
pub trait ObsControl: Send + Sync {
    /// Hard-cut to a scene
    async fn switch_scene(&self, scene: &str) -> Result<()>;

    /// Switch to a scene using the given transition
    async fn switch_scene_smooth(
        &self,
        scene: &str,
        transition: &str,
        duration_ms: u32,
    ) -> Result<()>;

    /// Make a source visible within a scene. Returns `false` when the source
    /// does not exist in that scene (routine when rotating location scenes).
    async fn show_source(&self, scene: &str, source: &str) -> Result<bool>;

    /// Hide a source within a scene. Returns `false` when the source does
    /// not exist in that scene.
    async fn hide_source(&self, scene: &str, source: &str) -> Result<bool>;

    /// OBS-reported duration of a media input; zero when unavailable
    async fn media_duration(&self, source: &str) -> Result<Duration>;

    /// Set the background-music volume multiplier directly
    async fn set_bgm_volume(&self, volume: f32) -> Result<()>;

    /// Fade background music down to the ducked level
    async fn duck_background_music(&self) -> Result<()>;

    /// Fade background music back to the normal level
    async fn restore_background_music(&self) -> Result<()>;

    /// Point a media input at a different audio file
    async fn update_audio_source_file(&self, source: &str, file_path: &str) -> Result<()>;
}

/// Factory producing fresh OBS connection handles.
///
/// Cycler tasks acquire their own handle on start and release it on stop, so
/// no handle is used from two tasks at once.
#[async_trait]
pub trait ObsConnect: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ObsControl>>;
}
