pub mod compositor;
pub mod error;
pub mod ffmpeg_utils;
pub mod hints;
pub mod plan;
pub mod probe;
pub mod render;
pub mod timeline;
pub mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use compositor::{Composition, Compositor, CompositorOptions, MixOutcome};
pub use error::{
    CompositionError, FfmpegError, MetadataFormatError, MixError, ProbeError, RenderError, Result,
};
pub use ffmpeg_utils::version_info as ffmpeg_version_info;
pub use ffmpeg_utils::{init, install_log_filter};
pub use hints::{pair_hints, parse_hints};
pub use plan::MixPlan;
pub use probe::{FfmpegProber, MediaProber};
pub use render::{FfmpegRenderer, ProgressFn, RenderJob, RenderSettings, RenderedMix, Renderer};
pub use types::{BackgroundInput, DroppedTrack, ProbedMedia, ResolvedSegment, TrackHint};
