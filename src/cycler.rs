//! Background scene/source rotation
//!
//! A [`SubsceneCycler`] runs at most one rotation task at a time. Starting a
//! new configuration stops the previous task first; re-issuing an identical
//! configuration while it runs is a no-op. Each task acquires its own OBS
//! handle from the connector on start and releases it on stop.
//!
//! Usage for scenes:
//! ```ignore
//! let mut cycler = SubsceneCycler::new(connector);
//! cycler.start_scene_cycling(scenes, Duration::from_secs(3), true, None, None, None).await?;
//! // ...
//! cycler.stop(Some(Duration::from_millis(500))).await;
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::seq::IndexedRandom;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{CyclerError, Result};
use crate::obs::{ObsConnect, ObsControl};
use crate::playlist::Location;
use crate::{sleep_interruptibly, CancelToken};

pub const DEFAULT_TRANSITION: &str = "Fade";
pub const DEFAULT_TRANSITION_MS: u32 = 500;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll slice for the location wait; short so stop requests land fast
const LOCATION_POLL: Duration = Duration::from_millis(50);
/// How long a stopping outer task waits for its inner cycler
const INNER_STOP_TIMEOUT: Duration = Duration::from_secs(2);
/// Bounded wait applied when a new config replaces a running one
const RESTART_STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// One rotation configuration. Compared by value: identical configs do not
/// restart a running task.
#[derive(Debug, Clone, PartialEq)]
pub enum CyclerConfig {
    /// Rotate whole scenes round-robin
    Scenes {
        scenes: Vec<String>,
        duration: Duration,
        smooth: bool,
        transition: String,
        transition_ms: u32,
        poll_interval: Duration,
    },
    /// Within one scene, show exactly one source at a time
    MediaSources {
        scene_name: String,
        media_sources: Vec<String>,
        duration: Duration,
        poll_interval: Duration,
    },
    /// Two-level rotation: locations outside, sources inside
    LocationCycling {
        locations: Vec<Location>,
        total_duration: Duration,
        location_switch_duration: Duration,
        media_source_cycle_duration: Duration,
        poll_interval: Duration,
    },
}

impl CyclerConfig {
    fn mode_name(&self) -> &'static str {
        match self {
            CyclerConfig::Scenes { .. } => "scenes",
            CyclerConfig::MediaSources { .. } => "media_sources",
            CyclerConfig::LocationCycling { .. } => "location_cycling",
        }
    }
}

struct ActiveCycler {
    config: CyclerConfig,
    cancel: CancelToken,
    handle: JoinHandle<()>,
    /// Filled by the task once it has connected; used by stop() for the
    /// mode-specific cleanup, then dropped to release the handle.
    obs_slot: Arc<Mutex<Option<Arc<dyn ObsControl>>>>,
}

/// Rotates scenes, media sources, or locations in a background task
pub struct SubsceneCycler {
    connector: Arc<dyn ObsConnect>,
    active: Option<ActiveCycler>,
}

impl SubsceneCycler {
    pub fn new(connector: Arc<dyn ObsConnect>) -> Self {
        Self {
            connector,
            active: None,
        }
    }

    /// Whether a rotation task is currently live. A task that died on its
    /// own (location budget exhausted) reads as not running.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .map(|a| !a.handle.is_finished())
            .unwrap_or(false)
    }

    /// Begin rotating full scenes at fixed intervals, round-robin.
    pub async fn start_scene_cycling(
        &mut self,
        scenes: Vec<String>,
        duration: Duration,
        smooth: bool,
        transition: Option<String>,
        transition_ms: Option<u32>,
        poll_interval: Option<Duration>,
    ) -> Result<()> {
        if scenes.is_empty() {
            return Err(CyclerError::EmptyList("scene").into());
        }
        self.start(CyclerConfig::Scenes {
            scenes,
            duration,
            smooth,
            transition: transition.unwrap_or_else(|| DEFAULT_TRANSITION.to_string()),
            transition_ms: transition_ms.unwrap_or(DEFAULT_TRANSITION_MS),
            poll_interval: poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        })
        .await
    }

    /// Within a fixed scene, repeatedly show one random source (never the
    /// same twice in a row) and hide the rest.
    pub async fn start_media_source_cycling(
        &mut self,
        scene_name: String,
        media_sources: Vec<String>,
        duration: Duration,
        poll_interval: Option<Duration>,
    ) -> Result<()> {
        if media_sources.is_empty() {
            return Err(CyclerError::EmptyList("media source").into());
        }
        self.start(CyclerConfig::MediaSources {
            scene_name,
            media_sources,
            duration,
            poll_interval: poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        })
        .await
    }

    /// Two-level cycling, bounded by a total wall-clock budget:
    /// - Outer: switch locations every `location_switch_duration`
    /// - Inner: switch sources within the location every
    ///   `media_source_cycle_duration`
    pub async fn start_location_cycling(
        &mut self,
        locations: Vec<Location>,
        total_duration: Duration,
        location_switch_duration: Duration,
        media_source_cycle_duration: Duration,
        poll_interval: Option<Duration>,
    ) -> Result<()> {
        if locations.is_empty() {
            return Err(CyclerError::EmptyList("location").into());
        }
        self.start(CyclerConfig::LocationCycling {
            locations,
            total_duration,
            location_switch_duration,
            media_source_cycle_duration,
            poll_interval: poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        })
        .await
    }

    async fn start(&mut self, config: CyclerConfig) -> Result<()> {
        if self.is_running() {
            if let Some(active) = &self.active {
                if active.config == config {
                    tracing::debug!("Cycler: same config, already running");
                    return Ok(());
                }
            }
        }

        self.stop(Some(RESTART_STOP_TIMEOUT)).await;

        let cancel = CancelToken::new();
        let obs_slot: Arc<Mutex<Option<Arc<dyn ObsControl>>>> = Arc::new(Mutex::new(None));
        let handle = tokio::spawn(run_cycler(
            Arc::clone(&self.connector),
            config.clone(),
            cancel.clone(),
            Arc::clone(&obs_slot),
        ));

        tracing::info!("Cycler started in {} mode", config.mode_name());
        self.active = Some(ActiveCycler {
            config,
            cancel,
            handle,
            obs_slot,
        });
        Ok(())
    }

    /// Signal the task to stop and join it, bounded by `timeout`
    /// (`None` waits indefinitely). If the join times out the call proceeds
    /// anyway; the task is never force-killed and exits at its next cancel
    /// check. For media-source mode, leaves only the first configured source
    /// visible. Idempotent.
    pub async fn stop(&mut self, timeout: Option<Duration>) {
        let Some(active) = self.active.take() else {
            return;
        };

        if active.handle.is_finished() {
            tracing::debug!("Cycler task already finished");
            return;
        }

        active.cancel.cancel();
        let mut handle = active.handle;
        match timeout {
            Some(t) => {
                if tokio::time::timeout(t, &mut handle).await.is_err() {
                    tracing::warn!("Cycler task did not stop within {:?}", t);
                }
            }
            None => {
                let _ = (&mut handle).await;
            }
        }

        let obs = active.obs_slot.lock().expect("obs slot poisoned").take();
        if let Some(obs) = obs {
            if let CyclerConfig::MediaSources {
                scene_name,
                media_sources,
                ..
            } = &active.config
            {
                // Deterministic rest state: first source visible, rest hidden
                if let Some((first, rest)) = media_sources.split_first() {
                    if let Err(e) = obs.show_source(scene_name, first).await {
                        tracing::warn!("Cleanup: failed to show '{}': {}", first, e);
                    }
                    for source in rest {
                        if let Err(e) = obs.hide_source(scene_name, source).await {
                            tracing::debug!("Cleanup: failed to hide '{}': {}", source, e);
                        }
                    }
                }
            }
        }

        tracing::info!("Cycler stopped");
    }
}

async fn run_cycler(
    connector: Arc<dyn ObsConnect>,
    config: CyclerConfig,
    cancel: CancelToken,
    obs_slot: Arc<Mutex<Option<Arc<dyn ObsControl>>>>,
) {
    let obs = match connector.connect().await {
        Ok(obs) => obs,
        Err(e) => {
            tracing::error!("OBS connection failed, cycler will not run: {}", e);
            return;
        }
    };
    *obs_slot.lock().expect("obs slot poisoned") = Some(Arc::clone(&obs));

    match config {
        CyclerConfig::Scenes {
            scenes,
            duration,
            smooth,
            transition,
            transition_ms,
            poll_interval,
        } => {
            run_scene_cycler(
                obs,
                scenes,
                duration,
                smooth,
                transition,
                transition_ms,
                poll_interval,
                cancel,
            )
            .await
        }
        CyclerConfig::MediaSources {
            scene_name,
            media_sources,
            duration,
            poll_interval,
        } => {
            run_media_source_cycler(
                obs,
                scene_name,
                media_sources,
                duration,
                poll_interval,
                cancel,
            )
            .await
        }
        CyclerConfig::LocationCycling {
            locations,
            total_duration,
            location_switch_duration,
            media_source_cycle_duration,
            poll_interval,
        } => {
            run_location_cycler(
                obs,
                locations,
                total_duration,
                location_switch_duration,
                media_source_cycle_duration,
                poll_interval,
                cancel,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_scene_cycler(
    obs: Arc<dyn ObsControl>,
    scenes: Vec<String>,
    duration: Duration,
    smooth: bool,
    transition: String,
    transition_ms: u32,
    poll_interval: Duration,
    cancel: CancelToken,
) {
    let mut index = 0usize;
    while !cancel.is_cancelled() {
        let scene = &scenes[index % scenes.len()];
        tracing::info!("[scenes] switching to {}", scene);

        let result = if smooth {
            obs.switch_scene_smooth(scene, &transition, transition_ms).await
        } else {
            obs.switch_scene(scene).await
        };
        if let Err(e) = result {
            tracing::error!("Failed to switch to {}: {}", scene, e);
        }

        sleep_interruptibly(duration, poll_interval, &cancel).await;
        index += 1;
    }
}

async fn run_media_source_cycler(
    obs: Arc<dyn ObsControl>,
    scene_name: String,
    media_sources: Vec<String>,
    duration: Duration,
    poll_interval: Duration,
    cancel: CancelToken,
) {
    if media_sources.is_empty() {
        tracing::warn!("No media sources to cycle in scene '{}'", scene_name);
        return;
    }

    let mut last: Option<String> = None;
    while !cancel.is_cancelled() {
        let current = match pick_excluding(&media_sources, last.as_ref(), &mut rand::rng()) {
            Some(source) => source.clone(),
            None => break,
        };

        tracing::info!("[media_sources] switching to {} in {}", current, scene_name);

        match obs.show_source(&scene_name, &current).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Source '{}' not found in '{}'", current, scene_name)
            }
            Err(e) => {
                tracing::warn!("Failed to show '{}' in '{}': {}", current, scene_name, e)
            }
        }

        for source in &media_sources {
            if *source != current {
                match obs.hide_source(&scene_name, source).await {
                    Ok(_) => {}
                    Err(e) => tracing::debug!(
                        "Failed to hide '{}' in '{}': {}",
                        source,
                        scene_name,
                        e
                    ),
                }
            }
        }

        last = Some(current);
        sleep_interruptibly(duration, poll_interval, &cancel).await;
    }
}

struct InnerCycler {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

async fn stop_inner_cycler(inner: &mut Option<InnerCycler>) {
    if let Some(task) = inner.take() {
        task.cancel.cancel();
        let mut handle = task.handle;
        if tokio::time::timeout(INNER_STOP_TIMEOUT, &mut handle)
            .await
            .is_err()
        {
            tracing::warn!("Media source cycler task did not stop in time");
        }
    }
}

/// Outer loop of location cycling:
/// 1. Pick a random location (excluding the previous one)
/// 2. Switch to its scene; on failure skip straight to the next location
/// 3. Run an inner media-source cycler over its sources
/// 4. Wait min(location_switch_duration, remaining budget)
/// 5. Repeat until the total budget elapses or the task is stopped
async fn run_location_cycler(
    obs: Arc<dyn ObsControl>,
    locations: Vec<Location>,
    total_duration: Duration,
    location_switch_duration: Duration,
    media_source_cycle_duration: Duration,
    poll_interval: Duration,
    cancel: CancelToken,
) {
    if locations.is_empty() {
        tracing::warn!("No locations configured for location cycling");
        return;
    }

    let start_time = Instant::now();
    let mut last: Option<Location> = None;
    let mut inner: Option<InnerCycler> = None;

    while !cancel.is_cancelled() {
        let elapsed = start_time.elapsed();
        if elapsed >= total_duration {
            tracing::info!(
                "Location cycling completed after {:.1}s (target: {:.1}s)",
                elapsed.as_secs_f64(),
                total_duration.as_secs_f64()
            );
            break;
        }

        let remaining = total_duration - elapsed;
        let current_location_duration = location_switch_duration.min(remaining);

        let location = match pick_excluding(&locations, last.as_ref(), &mut rand::rng()) {
            Some(location) => location.clone(),
            None => break,
        };
        last = Some(location.clone());

        tracing::info!(
            "[location_cycling] switching to location '{}' (remaining: {:.1}s, this location: {:.1}s)",
            location.scene,
            remaining.as_secs_f64(),
            current_location_duration.as_secs_f64()
        );

        stop_inner_cycler(&mut inner).await;

        if let Err(e) = obs
            .switch_scene_smooth(&location.scene, DEFAULT_TRANSITION, DEFAULT_TRANSITION_MS)
            .await
        {
            tracing::error!(
                "Failed to switch to location scene '{}': {}",
                location.scene,
                e
            );
            // Skip to the next location without burning the slot; yield so a
            // run of consecutive failures stays cooperative
            tokio::task::yield_now().await;
            continue;
        }

        if !location.sources.is_empty() {
            let inner_cancel = CancelToken::new();
            let handle = tokio::spawn(run_media_source_cycler(
                Arc::clone(&obs),
                location.scene.clone(),
                location.sources.clone(),
                media_source_cycle_duration,
                poll_interval,
                inner_cancel.clone(),
            ));
            inner = Some(InnerCycler {
                cancel: inner_cancel,
                handle,
            });
        } else {
            tracing::warn!("No sources configured for location '{}'", location.scene);
        }

        // Hold this location for its slot, polling in short slices so a stop
        // request lands within ~50 ms
        let location_start = Instant::now();
        while !cancel.is_cancelled() {
            let at_location = location_start.elapsed();
            if at_location >= current_location_duration {
                break;
            }
            let remaining_slot = current_location_duration - at_location;
            tokio::time::sleep(remaining_slot.min(LOCATION_POLL)).await;
        }
    }

    stop_inner_cycler(&mut inner).await;
}

/// Pick a random element, excluding the previous pick when the pool has more
/// than one element. With a single-element pool the element is always reused.
fn pick_excluding<'a, T: PartialEq>(
    pool: &'a [T],
    last: Option<&T>,
    rng: &mut impl rand::Rng,
) -> Option<&'a T> {
    if pool.len() <= 1 {
        return pool.first();
    }
    let candidates: Vec<&T> = pool.iter().filter(|&item| last != Some(item)).collect();
    if candidates.is_empty() {
        // Every element equals the previous pick (duplicate pool)
        return pool.choose(rng);
    }
    candidates.choose(rng).copied()
}
