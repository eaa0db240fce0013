//! Metadata prober
//!
//! Discovers the true duration of an input behind a uniform async contract.
//! Probing only reads the file and is never retried.

use std::future::Future;
use std::path::Path;

use crate::error::ProbeError;
use crate::ffmpeg_utils::{ffmpeg, ts_to_secs};
use crate::types::ProbedMedia;

/// Media inspection capability.
///
/// Implementations must be safe to call concurrently on distinct files.
pub trait MediaProber: Send + Sync {
    /// Determine the duration of the audio file at `path`.
    fn probe(&self, path: &Path) -> impl Future<Output = Result<ProbedMedia, ProbeError>> + Send;
}

/// Prober backed by FFmpeg's demuxers, run on the blocking thread pool
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegProber;

impl FfmpegProber {
    pub fn new() -> Self {
        Self
    }
}

impl MediaProber for FfmpegProber {
    async fn probe(&self, path: &Path) -> Result<ProbedMedia, ProbeError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || probe_file(&path))
            .await
            .map_err(|e| ProbeError::Unavailable(format!("probe task failed: {}", e)))?
    }
}

/// Open `path` and read its duration.
///
/// Uses the container duration when present and falls back to the best audio
/// stream's own duration.
pub fn probe_file(path: &Path) -> Result<ProbedMedia, ProbeError> {
    let context = ffmpeg::format::input(&path).map_err(|e| ProbeError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let stream = context
        .streams()
        .best(ffmpeg::media::Type::Audio)
        .ok_or_else(|| ProbeError::NoAudioStream {
            path: path.to_path_buf(),
        })?;

    let container = context.duration();
    let mut duration_secs = if container > 0 {
        container as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
    } else {
        0.0
    };

    if duration_secs <= 0.0 && stream.duration() > 0 {
        duration_secs = ts_to_secs(stream.duration(), stream.time_base());
    }

    if !(duration_secs.is_finite() && duration_secs > 0.0) {
        return Err(ProbeError::NoDuration {
            path: path.to_path_buf(),
        });
    }

    tracing::debug!(path = ?path, duration_secs, "probed media");

    Ok(ProbedMedia {
        path: path.to_path_buf(),
        duration_secs,
    })
}
