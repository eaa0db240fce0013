//! Compositor orchestrator
//!
//! Drives one request end to end: probe the main track, fan out background
//! probes, place and resolve the backgrounds, build the plan, and hand it to
//! the renderer exactly once.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::join_all;

use crate::error::{CompositionError, MixError, ProbeError, RenderError};
use crate::plan::{self, MixPlan};
use crate::probe::MediaProber;
use crate::render::{ProgressFn, RenderJob, RenderedMix, Renderer};
use crate::timeline::{reconcile, resolve};
use crate::types::{BackgroundInput, DroppedTrack, ProbedMedia, ResolvedSegment};

/// Time limits applied by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorOptions {
    pub probe_timeout: Duration,
    pub render_timeout: Duration,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(600),
        }
    }
}

/// A finished plan plus the backgrounds that could not be used
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub plan: MixPlan,
    pub dropped: Vec<DroppedTrack>,
}

/// Result of a full compose-and-render run
#[derive(Debug, Clone, PartialEq)]
pub struct MixOutcome {
    pub rendered: RenderedMix,
    pub segments: Vec<ResolvedSegment>,
    pub dropped: Vec<DroppedTrack>,
}

pub struct Compositor<P, R> {
    prober: P,
    renderer: R,
    options: CompositorOptions,
}

impl<P, R> Compositor<P, R>
where
    P: MediaProber,
    R: Renderer,
{
    pub fn new(prober: P, renderer: R, options: CompositorOptions) -> Self {
        Self {
            prober,
            renderer,
            options,
        }
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Probe every input and build the mix plan.
    ///
    /// The main probe must succeed. A failed background probe drops only that
    /// track, unless every supplied background fails.
    pub async fn compose(
        &self,
        main: &Path,
        backgrounds: &[BackgroundInput],
    ) -> Result<Composition, CompositionError> {
        let main_media = self.probe(main).await.map_err(|e| {
            tracing::warn!(path = ?main, error = %e, "main track probe failed");
            CompositionError::MainProbeFailed(e)
        })?;
        let main_duration = main_media.duration_secs;

        // join_all keeps results index-aligned with `backgrounds`
        let results = join_all(backgrounds.iter().map(|bg| self.probe(&bg.path))).await;

        let mut placed = Vec::with_capacity(backgrounds.len());
        let mut dropped = Vec::new();
        for (ordinal, (bg, result)) in backgrounds.iter().zip(results).enumerate() {
            match result {
                Ok(media) => placed.push(reconcile(&bg.hint, &media, main_duration, ordinal)),
                Err(e) => {
                    tracing::warn!(ordinal, path = ?bg.path, error = %e, "dropping background track");
                    dropped.push(DroppedTrack {
                        ordinal,
                        path: bg.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !backgrounds.is_empty() && placed.is_empty() {
            return Err(CompositionError::NoUsableBackgrounds {
                supplied: backgrounds.len(),
            });
        }

        let segments = resolve(&placed, main_duration);
        let plan = plan::build(main.to_path_buf(), main_duration, segments);

        tracing::info!(
            main = ?main,
            main_duration_secs = main_duration,
            backgrounds = backgrounds.len(),
            dropped = dropped.len(),
            audible = plan.chains.len(),
            "composition ready"
        );

        Ok(Composition { plan, dropped })
    }

    /// Render a plan to `output` within the configured time limit.
    pub async fn render(
        &self,
        plan: MixPlan,
        output: PathBuf,
        progress: Option<ProgressFn>,
    ) -> Result<RenderedMix, RenderError> {
        let job = RenderJob {
            plan,
            output,
            progress,
        };
        let limit = self.options.render_timeout;

        // Dropping the render future on timeout cancels the work behind it.
        match tokio::time::timeout(limit, self.renderer.render(job)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(secs = limit.as_secs(), "render timed out");
                Err(RenderError::Timeout {
                    secs: limit.as_secs(),
                })
            }
        }
    }

    /// Compose and render in one step.
    pub async fn compose_and_render(
        &self,
        main: &Path,
        backgrounds: &[BackgroundInput],
        output: PathBuf,
        progress: Option<ProgressFn>,
    ) -> Result<MixOutcome, MixError> {
        let Composition { plan, dropped } = self.compose(main, backgrounds).await?;
        let segments = plan.segments.clone();
        let rendered = self.render(plan, output, progress).await?;

        Ok(MixOutcome {
            rendered,
            segments,
            dropped,
        })
    }

    async fn probe(&self, path: &Path) -> Result<ProbedMedia, ProbeError> {
        let limit = self.options.probe_timeout;
        match tokio::time::timeout(limit, self.prober.probe(path)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout {
                path: path.to_path_buf(),
                secs: limit.as_secs(),
            }),
        }
    }
}
