//! Shared test doubles for the OBS facade

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ObsError, Result};
use crate::obs::{ObsConnect, ObsControl};

/// A recorded facade call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Switch(String),
    SwitchSmooth(String),
    Show(String, String),
    Hide(String, String),
    MediaDuration(String),
    SetBgmVolume,
    Duck,
    Restore,
    UpdateAudioFile(String, String),
}

/// Records every facade call; scene switches can be made to fail.
pub struct MockObs {
    calls: Mutex<Vec<Call>>,
    fail_scenes: Mutex<HashSet<String>>,
    media_duration: Mutex<Duration>,
}

impl MockObs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_scenes: Mutex::new(HashSet::new()),
            media_duration: Mutex::new(Duration::ZERO),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_scene(&self, scene: &str) {
        self.fail_scenes.lock().unwrap().insert(scene.to_string());
    }

    pub fn set_media_duration(&self, duration: Duration) {
        *self.media_duration.lock().unwrap() = duration;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_scene(&self, scene: &str) -> Result<()> {
        if self.fail_scenes.lock().unwrap().contains(scene) {
            return Err(ObsError::SceneNotFound(scene.to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl ObsControl for MockObs {
    async fn switch_scene(&self, scene: &str) -> Result<()> {
        self.record(Call::Switch(scene.to_string()));
        self.check_scene(scene)
    }

    async fn switch_scene_smooth(
        &self,
        scene: &str,
        _transition: &str,
        _duration_ms: u32,
    ) -> Result<()> {
        self.record(Call::SwitchSmooth(scene.to_string()));
        self.check_scene(scene)
    }

    async fn show_source(&self, scene: &str, source: &str) -> Result<bool> {
        self.record(Call::Show(scene.to_string(), source.to_string()));
        Ok(true)
    }

    async fn hide_source(&self, scene: &str, source: &str) -> Result<bool> {
        self.record(Call::Hide(scene.to_string(), source.to_string()));
        Ok(true)
    }

    async fn media_duration(&self, source: &str) -> Result<Duration> {
        self.record(Call::MediaDuration(source.to_string()));
        Ok(*self.media_duration.lock().unwrap())
    }

    async fn set_bgm_volume(&self, _volume: f32) -> Result<()> {
        self.record(Call::SetBgmVolume);
        Ok(())
    }

    async fn duck_background_music(&self) -> Result<()> {
        self.record(Call::Duck);
        Ok(())
    }

    async fn restore_background_music(&self) -> Result<()> {
        self.record(Call::Restore);
        Ok(())
    }

    async fn update_audio_source_file(&self, source: &str, file_path: &str) -> Result<()> {
        self.record(Call::UpdateAudioFile(
            source.to_string(),
            file_path.to_string(),
        ));
        Ok(())
    }
}

/// Hands out the same [`MockObs`] on every connect, counting connections.
pub struct MockConnector {
    obs: Arc<MockObs>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, Arc<MockObs>) {
        let obs = MockObs::new();
        let connector = Arc::new(Self {
            obs: Arc::clone(&obs),
            connects: AtomicUsize::new(0),
        });
        (connector, obs)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObsConnect for MockConnector {
    async fn connect(&self) -> Result<Arc<dyn ObsControl>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.obs) as Arc<dyn ObsControl>)
    }
}
