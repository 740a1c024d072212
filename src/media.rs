//! Media readiness resolution
//!
//! Locates generated audio artifacts on disk, translates container paths to
//! the paths OBS sees on the host, and measures audio durations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::config::MediaConfig;
use crate::error::{EchoBotError, MediaError};

/// Translates paths between the container filesystem (where media is
/// generated) and the host filesystem (where OBS opens it).
///
/// A pure prefix rewrite: paths outside the mapped root, or with no host
/// root configured, pass through unchanged.
#[derive(Debug, Clone)]
pub struct PathMapper {
    host_root: Option<PathBuf>,
    container_root: PathBuf,
}

impl PathMapper {
    pub fn new(media: &MediaConfig) -> Self {
        Self {
            host_root: media.host_dir.clone(),
            container_root: media.container_dir.clone(),
        }
    }

    /// Convert a container path into the equivalent host path for OBS.
    pub fn to_host_path(&self, path: &Path) -> String {
        let original = path.to_string_lossy().into_owned();
        let Some(host_root) = &self.host_root else {
            return original;
        };
        let container_root = self.container_root.to_string_lossy();
        match original.strip_prefix(container_root.as_ref()) {
            Some(rest) => {
                format!("{}{}", host_root.to_string_lossy(), rest).replace('\\', "/")
            }
            None => original,
        }
    }
}

/// Find the most recent audio file for a topic in the given directory.
///
/// Scans for files named `{topic}_*.mp3` and returns the newest by
/// modification time, or `None` when no matching file exists. A missing
/// directory is treated the same as an empty one.
pub fn find_latest_audio_file(topic: &str, dir: &Path) -> Option<PathBuf> {
    let prefix = format!("{topic}_");
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Audio directory not readable: {}: {}", dir.display(), e);
            return None;
        }
    };

    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(&prefix) || !name.ends_with(".mp3") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let Ok(mtime) = meta.modified() else { continue };
        if latest.as_ref().map(|(t, _)| mtime > *t).unwrap_or(true) {
            latest = Some((mtime, entry.path()));
        }
    }

    latest.map(|(_, path)| path)
}

/// Measure the duration of an audio file by probing its container headers.
pub fn audio_duration(path: &Path) -> Result<Duration, EchoBotError> {
    let file = std::fs::File::open(path).map_err(|e| MediaError::Probe {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MediaError::Probe {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| MediaError::Probe {
            path: path.display().to_string(),
            message: "no default audio track".to_string(),
        })?;

    let params = &track.codec_params;
    let seconds = match (params.n_frames, params.sample_rate, params.time_base) {
        (Some(frames), _, Some(time_base)) => {
            let time = time_base.calc_time(frames);
            time.seconds as f64 + time.frac
        }
        (Some(frames), Some(rate), None) if rate > 0 => frames as f64 / rate as f64,
        _ => {
            return Err(MediaError::Probe {
                path: path.display().to_string(),
                message: "duration not present in container headers".to_string(),
            }
            .into())
        }
    };

    Ok(Duration::from_secs_f64(seconds))
}
