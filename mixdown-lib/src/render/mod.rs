//! Rendering of mix plans
//!
//! A [`Renderer`] consumes a [`MixPlan`] exactly once and writes a single
//! encoded audio file. The FFmpeg implementation lives in [`pipeline`];
//! [`filtergraph`] is the pure translation of a plan into libavfilter syntax.

pub mod decoder;
pub mod encoder;
pub mod filtergraph;
pub mod pipeline;

pub use pipeline::FfmpegRenderer;

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::RenderError;
use crate::plan::MixPlan;

/// Progress observer, called with a completion fraction in `[0, 1]`
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Output encoding parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            bitrate: 128_000,
        }
    }
}

/// One unit of render work
pub struct RenderJob {
    pub plan: MixPlan,
    pub output: PathBuf,
    pub progress: Option<ProgressFn>,
}

impl RenderJob {
    pub fn new(plan: MixPlan, output: PathBuf) -> Self {
        Self {
            plan,
            output,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("plan", &self.plan)
            .field("output", &self.output)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// A finished artifact
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMix {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub bytes: u64,
}

/// Executes mix plans.
///
/// A failed render must not leave a partial file at `job.output`.
pub trait Renderer: Send + Sync {
    fn render(&self, job: RenderJob) -> impl Future<Output = Result<RenderedMix, RenderError>> + Send;
}

/// Raises a shared cancel flag when dropped.
///
/// Held by the async side of a render so that abandoning the future stops
/// the blocking worker at its next check.
pub struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (Self(flag.clone()), flag)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Throttles progress callbacks to whole-percent steps.
pub(crate) struct ProgressReporter {
    callback: Option<ProgressFn>,
    last_percent: Option<u32>,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressFn>) -> Self {
        Self {
            callback,
            last_percent: None,
        }
    }

    pub(crate) fn report(&mut self, fraction: f64) {
        let Some(callback) = &self.callback else {
            return;
        };
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let percent = (fraction * 100.0).floor() as u32;
        if self.last_percent.is_some_and(|last| percent <= last) {
            return;
        }
        self.last_percent = Some(percent);
        callback(fraction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_cancel_on_drop_sets_flag() {
        let (guard, flag) = CancelOnDrop::new();
        assert!(!flag.load(Ordering::Relaxed));
        drop(guard);
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_progress_reporter_is_monotonic_and_throttled() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut reporter = ProgressReporter::new(Some(Arc::new(move |f| {
            sink.lock().unwrap().push(f);
        })));

        reporter.report(0.0);
        reporter.report(0.001);
        reporter.report(0.5);
        reporter.report(0.4);
        reporter.report(2.0);
        reporter.report(f64::NAN);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_progress_reporter_without_callback() {
        let mut reporter = ProgressReporter::new(None);
        reporter.report(0.5);
    }

    #[test]
    fn test_default_settings() {
        let s = RenderSettings::default();
        assert_eq!(s.sample_rate, 44_100);
        assert_eq!(s.channels, 2);
        assert_eq!(s.bitrate, 128_000);
    }
}
