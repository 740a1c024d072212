//! The eternal show loop
//!
//! [`RadioFlow`] walks the playlist forever: per item it gates on media
//! readiness, switches scenes, configures the background cycler, resolves a
//! wait duration, sleeps interruptibly, and tears down. A failure inside one
//! item is logged and never kills the loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::ama::{load_answered_messages, VoiceReplyGenerator};
use crate::config::Config;
use crate::cycler::SubsceneCycler;
use crate::error::Result;
use crate::events::EventClient;
use crate::media::{audio_duration, find_latest_audio_file, PathMapper};
use crate::obs::{ObsConnect, ObsControl, CYCLER_EXCLUDED_SOURCES, VOICE_MUSIC_SOURCE};
use crate::playlist::{Playlist, PlaylistItem};
use crate::schedule::{Schedule, ScheduleEntry};
use crate::{sleep_interruptibly, CancelToken};

/// Scene that triggers the AMA side-channel
const WORKING_SCENE: &str = "working";
/// Logical scene whose OBS scene hosts the voice/music source
const NEWS_AUDIO_SCENE: &str = "ai_robotics_news";
/// Default wait when a scene has neither duration nor audio
const DEFAULT_SCENE_SECS: f64 = 10.0;
/// Extra second after measured audio/video so playback finishes cleanly
const PLAYBACK_BUFFER: Duration = Duration::from_secs(1);
/// Poll slice for driver-level interruptible waits
const ITEM_POLL: Duration = Duration::from_millis(500);
/// Bounded wait when stopping a cycler between items
const ITEM_STOP_TIMEOUT: Duration = Duration::from_millis(200);
/// Bounded wait after a location-cycling item completes
const LOCATION_STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// The playlist driver
pub struct RadioFlow {
    obs: Arc<dyn ObsControl>,
    cycler: SubsceneCycler,
    schedule: Schedule,
    playlist: Playlist,
    mapper: PathMapper,
    voice_dir: PathBuf,
    memory_file: PathBuf,
    transition: String,
    transition_ms: u32,
    dj_total_duration: Duration,
    dj_location_switch_default: f64,
    ama: Option<Arc<dyn VoiceReplyGenerator>>,
    events: Option<EventClient>,
    running: CancelToken,
}

impl RadioFlow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        obs: Arc<dyn ObsControl>,
        connector: Arc<dyn ObsConnect>,
        schedule: Schedule,
        playlist: Playlist,
        config: &Config,
        ama: Option<Arc<dyn VoiceReplyGenerator>>,
        events: Option<EventClient>,
    ) -> Self {
        Self {
            obs,
            cycler: SubsceneCycler::new(connector),
            schedule,
            playlist,
            mapper: PathMapper::new(&config.media),
            voice_dir: config.media.voice_output_dir(),
            memory_file: config.media.memory_output_dir().join("memory.json"),
            transition: config.obs.transition.clone(),
            transition_ms: config.obs.transition_ms,
            dj_total_duration: Duration::from_secs_f64(config.flow.dj_total_duration),
            dj_location_switch_default: config.flow.dj_location_switch_duration,
            ama,
            events,
            running: CancelToken::new(),
        }
    }

    /// Token cleared by signal handlers to request shutdown
    pub fn running_token(&self) -> CancelToken {
        self.running.clone()
    }

    /// Request shutdown; the loop finishes the current item and exits
    pub fn stop(&self) {
        self.running.cancel();
    }

    /// Run the playlist forever until shutdown is requested
    pub async fn start(&mut self) {
        tracing::info!("OBS stream service started");
        tracing::info!("Starting endless playlist cycle");
        tracing::info!("Agent: Systems online. I'm ready, let's begin our journey together.");

        while !self.running.is_cancelled() {
            let items: Vec<PlaylistItem> = self.playlist.items().to_vec();
            for item in &items {
                if let Err(e) = self.run_scene(item).await {
                    tracing::error!("Playlist item '{}' failed: {}", item.scene_name, e);
                }
                if self.running.is_cancelled() {
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// Process one playlist item end to end
    pub async fn run_scene(&mut self, item: &PlaylistItem) -> Result<()> {
        let scene_name = item.scene_name.as_str();

        if self.schedule.get(scene_name).is_none() {
            tracing::warn!("Scene '{}' missing from schedule, skipping", scene_name);
            return Ok(());
        }

        // Readiness gate for dynamically-generated segments: no audio on
        // disk means the item is skipped outright, before any OBS call
        if let Some(topic) = self
            .schedule
            .get(scene_name)
            .and_then(|e| e.audio_topic.clone())
        {
            let Some(audio_path) = find_latest_audio_file(&topic, &self.voice_dir) else {
                tracing::warn!("Audio file not found for {}", scene_name);
                tracing::info!("Skipping {} scene and moving to next item", scene_name);
                return Ok(());
            };

            let host_path = self.mapper.to_host_path(&audio_path);
            tracing::info!("Mapped path for OBS: {}", host_path);
            let file_name = audio_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.schedule
                .record_discovered_audio(scene_name, audio_path, host_path)?;
            if let Err(e) = self.schedule.save() {
                tracing::warn!("Failed to persist schedule: {}", e);
            }
            tracing::info!("Found audio file for {}: {}", scene_name, file_name);
        }

        // At most one cycler instance across the process: stop any leftover
        // from the previous item before touching OBS
        self.cycler.stop(Some(ITEM_STOP_TIMEOUT)).await;

        let Some(entry) = self.schedule.get(scene_name).cloned() else {
            return Ok(());
        };

        self.announce(scene_name);
        if entry.audio_topic.is_some() {
            self.notify_news_started(scene_name, &entry).await;
        }

        if item.location_config.is_some() {
            // The location cycler performs its own scene switches
            tracing::debug!(
                "Skipping initial scene switch for '{}', location cycler will handle it",
                scene_name
            );
        } else {
            if entry.has_audio {
                if let Err(e) = self.obs.duck_background_music().await {
                    tracing::warn!("Failed to duck background music: {}", e);
                }
            }

            if let Err(e) = self
                .obs
                .switch_scene_smooth(&entry.scene_name, &self.transition, self.transition_ms)
                .await
            {
                tracing::warn!("Failed to switch to '{}': {}", entry.scene_name, e);
            }

            if entry.audio_topic.is_some() {
                if let Some(audio_path_obs) = entry.audio_path_obs.as_deref() {
                    tracing::info!(
                        "Updating {} with news audio: {}",
                        VOICE_MUSIC_SOURCE,
                        audio_path_obs
                    );
                    match self
                        .obs
                        .update_audio_source_file(VOICE_MUSIC_SOURCE, audio_path_obs)
                        .await
                    {
                        Ok(()) => tracing::info!(
                            "Updated {} with {} audio",
                            VOICE_MUSIC_SOURCE,
                            scene_name
                        ),
                        Err(e) => {
                            tracing::error!("Failed to update {}: {}", VOICE_MUSIC_SOURCE, e)
                        }
                    }
                }
            }
        }

        // True once this item's waiting has already happened
        let mut waited = false;

        if let Some(location_config) = &item.location_config {
            let location_switch = location_config
                .location_switch_duration
                .unwrap_or(self.dj_location_switch_default);
            let media_cycle = location_config
                .media_source_cycle_duration
                .or_else(|| item.media_source_cycle.as_ref().map(|c| c.duration))
                .unwrap_or(10.0);
            let total = self.dj_total_duration;

            if Duration::from_secs_f64(location_switch) >= total {
                tracing::warn!(
                    "location_switch_duration ({:.0}s) >= total_duration ({:.0}s). \
                     Only one location will be shown!",
                    location_switch,
                    total.as_secs_f64()
                );
            }

            tracing::info!(
                "Starting location-based DJ cycling: {} locations, {:.0}s total, {:.0}s per location",
                location_config.locations.len(),
                total.as_secs_f64(),
                location_switch
            );

            match self
                .cycler
                .start_location_cycling(
                    location_config.locations.clone(),
                    total,
                    Duration::from_secs_f64(location_switch),
                    Duration::from_secs_f64(media_cycle),
                    None,
                )
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        "Waiting for location cycling to complete ({:.0}s)",
                        total.as_secs_f64()
                    );
                    sleep_interruptibly(total, ITEM_POLL, &self.running).await;
                    tracing::info!("Location cycling wait completed, stopping cycler");
                    self.cycler.stop(Some(LOCATION_STOP_TIMEOUT)).await;
                }
                Err(e) => {
                    tracing::error!("Failed to start location cycling: {}", e);
                }
            }
            waited = true;
        } else {
            let media_sources = item
                .media_sources
                .clone()
                .or_else(|| entry.media_sources.clone());

            if let Some(media_sources) = media_sources {
                // BGM and utility overlays stay out of the cycler's hands
                let filtered: Vec<String> = media_sources
                    .into_iter()
                    .filter(|s| !CYCLER_EXCLUDED_SOURCES.contains(&s.as_str()))
                    .collect();

                if filtered.is_empty() {
                    tracing::debug!("No cyclable media sources for '{}'", scene_name);
                } else {
                    let cycle = item.media_source_cycle.clone().unwrap_or_default();
                    if let Err(e) = self
                        .cycler
                        .start_media_source_cycling(
                            entry.scene_name.clone(),
                            filtered,
                            Duration::from_secs_f64(cycle.duration),
                            Some(Duration::from_secs_f64(cycle.poll_interval)),
                        )
                        .await
                    {
                        tracing::error!("Failed to start media source cycling: {}", e);
                    }
                }
            }
        }

        // Special 'working' scene: try to answer recent chat with a voice
        // reply, overriding the default wait when one is produced
        if scene_name == WORKING_SCENE && !waited {
            if let Some(ama) = self.ama.clone() {
                waited = self.run_ama_section(ama.as_ref()).await;
            }
        }

        if !waited {
            let wait = self.resolve_duration(item, &entry).await;
            sleep_interruptibly(wait, ITEM_POLL, &self.running).await;
        }

        // Leaving this playlist item: stop cycling, restore music
        self.cycler.stop(Some(ITEM_STOP_TIMEOUT)).await;
        tracing::debug!("Completed scene '{}', moving to next playlist item", scene_name);

        if entry.has_audio {
            if let Err(e) = self.obs.restore_background_music().await {
                tracing::warn!("Failed to restore background music: {}", e);
            }
        }

        Ok(())
    }

    /// Returns true when AMA audio played (the default wait is suppressed)
    async fn run_ama_section(&mut self, ama: &dyn VoiceReplyGenerator) -> bool {
        tracing::info!("Agent: Listening in, preparing an AMA voice response.");

        let answered = load_answered_messages(&self.memory_file);
        let filename = match ama.generate_reply(&answered).await {
            Ok(filename) => filename,
            Err(e) => {
                tracing::error!("AMA reply generation failed: {}", e);
                None
            }
        };

        let Some(filename) = filename else {
            // Let the scene wait its default duration so chat can populate
            tracing::info!("No new AMA voice message was generated");
            return false;
        };

        let Some(news_scene) = self
            .schedule
            .get(NEWS_AUDIO_SCENE)
            .map(|e| e.scene_name.clone())
        else {
            tracing::warn!(
                "No '{}' schedule entry, cannot play AMA audio",
                NEWS_AUDIO_SCENE
            );
            return false;
        };

        tracing::info!("Agent: I crafted an AMA reply, cueing the audio now.");
        let voice_path = self.voice_dir.join(&filename);
        let voice_path_host = self.mapper.to_host_path(&voice_path);

        if let Err(e) = self.obs.duck_background_music().await {
            tracing::warn!("Failed to duck background music: {}", e);
        }

        if let Err(e) = self
            .obs
            .switch_scene_smooth(&news_scene, &self.transition, self.transition_ms)
            .await
        {
            tracing::warn!("Failed to switch to '{}': {}", news_scene, e);
        }

        match self
            .obs
            .update_audio_source_file(VOICE_MUSIC_SOURCE, &voice_path_host)
            .await
        {
            Ok(()) => tracing::info!(
                "Updated {} with AMA audio: {}",
                VOICE_MUSIC_SOURCE,
                voice_path_host
            ),
            Err(e) => tracing::error!("Failed to update {}: {}", VOICE_MUSIC_SOURCE, e),
        }

        let duration = match audio_duration(&voice_path) {
            Ok(duration) => duration,
            Err(e) => {
                tracing::warn!("Could not measure AMA audio duration: {}", e);
                Duration::ZERO
            }
        };
        tracing::info!("AMA audio duration: {:.2} seconds", duration.as_secs_f64());
        sleep_interruptibly(duration + PLAYBACK_BUFFER, ITEM_POLL, &self.running).await;

        if let Err(e) = self.obs.restore_background_music().await {
            tracing::warn!("Failed to restore background music: {}", e);
        }

        true
    }

    /// Duration ladder: explicit config, measured audio, OBS-reported video
    /// length, flat default
    async fn resolve_duration(&self, item: &PlaylistItem, entry: &ScheduleEntry) -> Duration {
        if let Some(secs) = item.duration {
            return Duration::from_secs_f64(secs);
        }

        if entry.has_audio {
            if let Some(audio_path) = &entry.audio_path_env {
                tracing::info!(
                    "Scene '{}' has no duration, using audio length from: {}",
                    entry.scene_name,
                    audio_path.display()
                );
                return match audio_duration(audio_path) {
                    Ok(duration) if duration > Duration::ZERO => duration + PLAYBACK_BUFFER,
                    Ok(_) => Duration::ZERO,
                    Err(e) => {
                        tracing::warn!("Failed to measure audio duration: {}", e);
                        Duration::ZERO
                    }
                };
            }
        }

        if entry.video_path.is_some() && !entry.loop_video {
            let reported = match &entry.video_source_name {
                Some(source) => match self.obs.media_duration(source).await {
                    Ok(duration) => duration,
                    Err(e) => {
                        tracing::warn!("Failed to query media duration: {}", e);
                        Duration::ZERO
                    }
                },
                None => Duration::ZERO,
            };
            let duration = if reported > Duration::ZERO {
                reported
            } else {
                Duration::from_secs_f64(DEFAULT_SCENE_SECS)
            };
            return duration + PLAYBACK_BUFFER;
        }

        tracing::warn!(
            "Scene '{}' has no duration or audio. Defaulting to {:.0}s.",
            entry.scene_name,
            DEFAULT_SCENE_SECS
        );
        Duration::from_secs_f64(DEFAULT_SCENE_SECS)
    }

    fn announce(&self, scene_name: &str) {
        match scene_name {
            "dj_visual_only" => tracing::info!(
                "Agent: Switching to '{}'. Dialing up the visuals, feel the rhythm with me.",
                scene_name
            ),
            "working" => tracing::info!(
                "Agent: Switching to '{}'. I'm focused, scanning chat and plotting my next move.",
                scene_name
            ),
            "talking" => tracing::info!(
                "Agent: Switching to '{}'. I'm here, let's talk in real time.",
                scene_name
            ),
            "ai_robotics_news" => tracing::info!(
                "Agent: Switching to '{}'. Fresh AI and robotics intel incoming, I'll break it down.",
                scene_name
            ),
            "web3_news" => tracing::info!(
                "Agent: Switching to '{}'. Web3 pulse check, let's decode the decentralized frontier.",
                scene_name
            ),
            _ => tracing::info!(
                "Agent: Switching to '{}'. Settling in, let's enjoy this moment together.",
                scene_name
            ),
        }
    }

    async fn notify_news_started(&self, scene_name: &str, entry: &ScheduleEntry) {
        let Some(events) = &self.events else { return };
        let Some(audio_path) = &entry.audio_path_env else { return };

        let duration = audio_duration(audio_path)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let audio_file = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        events
            .send(
                "news_section_started",
                json!({
                    "scene": scene_name,
                    "audio_file": audio_file,
                    "duration_seconds": duration,
                }),
            )
            .await;
    }

    async fn shutdown(&mut self) {
        tracing::info!("Shutting down");
        tracing::info!("Agent: Powering down for now. Thanks for hanging out with me!");
        self.cycler.stop(None).await;
        tracing::info!("Good bye!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ama::AnsweredMessage;
    use crate::error::Result;
    use crate::test_support::{Call, MockConnector, MockObs};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::time::Instant;

    fn entry(real_name: &str) -> ScheduleEntry {
        ScheduleEntry {
            scene_name: real_name.to_string(),
            has_audio: false,
            audio_topic: None,
            video_path: None,
            loop_video: false,
            video_source_name: None,
            media_sources: None,
            audio_path_env: None,
            audio_path_obs: None,
        }
    }

    fn item(scene_name: &str, duration: Option<f64>) -> PlaylistItem {
        PlaylistItem {
            scene_name: scene_name.to_string(),
            duration,
            media_sources: None,
            media_source_cycle: None,
            location_config: None,
        }
    }

    struct FixedReply(Option<String>);

    #[async_trait]
    impl VoiceReplyGenerator for FixedReply {
        async fn generate_reply(
            &self,
            _answered: &[AnsweredMessage],
        ) -> Result<Option<String>> {
            Ok(self.0.clone())
        }
    }

    struct Fixture {
        flow: RadioFlow,
        obs: std::sync::Arc<MockObs>,
    }

    fn fixture(
        entries: Vec<(&str, ScheduleEntry)>,
        items: Vec<PlaylistItem>,
        ama: Option<Arc<dyn VoiceReplyGenerator>>,
    ) -> Fixture {
        let (connector, obs) = MockConnector::new();
        let mut config = Config::default();
        config.media.container_dir = std::env::temp_dir().join("echobot-test-none");

        let schedule = Schedule::from_entries(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<HashMap<_, _>>(),
        );
        let playlist = Playlist::from_items(items);

        let flow = RadioFlow::new(
            Arc::clone(&obs) as Arc<dyn ObsControl>,
            connector,
            schedule,
            playlist,
            &config,
            ama,
            None,
        );
        Fixture { flow, obs }
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_gate_skips_item_without_obs_calls() {
        let mut news = entry("News-Scene");
        news.audio_topic = Some("audio_ai_robotics".to_string());

        let mut fx = fixture(
            vec![("ai_robotics_news", news)],
            vec![item("ai_robotics_news", None)],
            None,
        );

        let start = Instant::now();
        fx.flow
            .run_scene(&item("ai_robotics_news", None))
            .await
            .unwrap();

        assert!(fx.obs.calls().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_duration_wins() {
        let mut fx = fixture(
            vec![("talking", entry("Talking-Scene"))],
            vec![item("talking", Some(5.0))],
            None,
        );

        let start = Instant::now();
        fx.flow.run_scene(&item("talking", Some(5.0))).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(6));
        assert!(fx
            .obs
            .calls()
            .contains(&Call::SwitchSmooth("Talking-Scene".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_pass_skips_unready_news() {
        let mut news = entry("News-Scene");
        news.audio_topic = Some("audio_ai_robotics".to_string());

        let items = vec![item("talking", Some(5.0)), item("ai_robotics_news", None)];
        let mut fx = fixture(
            vec![
                ("talking", entry("Talking-Scene")),
                ("ai_robotics_news", news),
            ],
            items.clone(),
            None,
        );

        let start = Instant::now();
        for it in &items {
            fx.flow.run_scene(it).await.unwrap();
        }

        let calls = fx.obs.calls();
        let switches: Vec<&Call> = calls
            .iter()
            .filter(|c| matches!(c, Call::SwitchSmooth(_)))
            .collect();
        assert_eq!(switches.len(), 1);
        assert_eq!(*switches[0], Call::SwitchSmooth("Talking-Scene".to_string()));
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_duration_from_obs_with_buffer() {
        let mut talking = entry("Talking-Scene");
        talking.video_path = Some("videos/clip.mp4".to_string());
        talking.loop_video = false;
        talking.video_source_name = Some("Talking_Video".to_string());

        let mut fx = fixture(
            vec![("talking", talking)],
            vec![item("talking", None)],
            None,
        );
        fx.obs.set_media_duration(Duration::from_secs(7));

        let start = Instant::now();
        fx.flow.run_scene(&item("talking", None)).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(8));
        assert!(elapsed < Duration::from_secs(9));
        assert!(fx
            .obs
            .calls()
            .contains(&Call::MediaDuration("Talking_Video".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_duration_fallback_when_unreported() {
        let mut talking = entry("Talking-Scene");
        talking.video_path = Some("videos/clip.mp4".to_string());
        talking.video_source_name = Some("Talking_Video".to_string());

        let mut fx = fixture(
            vec![("talking", talking)],
            vec![item("talking", None)],
            None,
        );

        let start = Instant::now();
        fx.flow.run_scene(&item("talking", None)).await.unwrap();

        // 10 s fallback + 1 s buffer
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(11));
        assert!(elapsed < Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_duration_without_media() {
        let mut fx = fixture(
            vec![("talking", entry("Talking-Scene"))],
            vec![item("talking", None)],
            None,
        );

        let start = Instant::now();
        fx.flow.run_scene(&item("talking", None)).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bgm_ducked_and_restored_for_audio_scene() {
        let mut talking = entry("Talking-Scene");
        talking.has_audio = true;

        let mut fx = fixture(
            vec![("talking", talking)],
            vec![item("talking", Some(3.0))],
            None,
        );

        fx.flow.run_scene(&item("talking", Some(3.0))).await.unwrap();

        let calls = fx.obs.calls();
        let duck = calls.iter().position(|c| *c == Call::Duck).unwrap();
        let switch = calls
            .iter()
            .position(|c| matches!(c, Call::SwitchSmooth(_)))
            .unwrap();
        let restore = calls.iter().position(|c| *c == Call::Restore).unwrap();
        assert!(duck < switch);
        assert!(switch < restore);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bgm_sources_excluded_from_cycler() {
        let mut it = item("talking", Some(12.0));
        it.media_sources = Some(vec![
            "Visual_1".to_string(),
            "Background-Music".to_string(),
            "UTIL_LOGS".to_string(),
        ]);

        let mut fx = fixture(vec![("talking", entry("Talking-Scene"))], vec![it.clone()], None);

        fx.flow.run_scene(&it).await.unwrap();

        for call in fx.obs.calls() {
            match call {
                Call::Show(_, source) | Call::Hide(_, source) => {
                    assert_ne!(source, "Background-Music");
                    assert_ne!(source, "UTIL_LOGS");
                }
                _ => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ama_reply_overrides_default_wait() {
        let mut fx = fixture(
            vec![
                ("working", entry("Working-Scene")),
                ("ai_robotics_news", entry("News-Scene")),
            ],
            vec![item("working", Some(300.0))],
            Some(Arc::new(FixedReply(Some("AMA_reply.mp3".to_string())))),
        );

        let start = Instant::now();
        fx.flow
            .run_scene(&item("working", Some(300.0)))
            .await
            .unwrap();

        // The AMA path waits audio length (+1 s buffer), not the 300 s item
        // duration; the probe fails on the absent file so only the buffer
        // remains
        assert!(start.elapsed() < Duration::from_secs(10));

        let calls = fx.obs.calls();
        assert!(calls.contains(&Call::SwitchSmooth("News-Scene".to_string())));
        assert!(calls.iter().any(|c| matches!(
            c,
            Call::UpdateAudioFile(source, path)
                if source == VOICE_MUSIC_SOURCE && path.ends_with("AMA_reply.mp3")
        )));
        assert!(calls.contains(&Call::Restore));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ama_none_falls_back_to_default_wait() {
        let mut fx = fixture(
            vec![
                ("working", entry("Working-Scene")),
                ("ai_robotics_news", entry("News-Scene")),
            ],
            vec![item("working", None)],
            Some(Arc::new(FixedReply(None))),
        );

        let start = Instant::now();
        fx.flow.run_scene(&item("working", None)).await.unwrap();

        // Default 10 s wait so chat has time to accumulate
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_scene_is_skipped() {
        let mut fx = fixture(vec![], vec![item("ghost", None)], None);

        let start = Instant::now();
        fx.flow.run_scene(&item("ghost", None)).await.unwrap();

        assert!(fx.obs.calls().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
