//! Renderer-agnostic mix plan
//!
//! A plan is an ordered list of per-segment operation chains plus the final
//! routing of the main track. It carries no encoding syntax; renderer adapters
//! translate it into whatever their engine understands.

pub mod builder;

pub use builder::build;

use serde::Serialize;
use std::path::PathBuf;

use crate::types::ResolvedSegment;

/// Gain applied to the main track in the final combine
pub const MAIN_GAIN: f64 = 1.0;

/// A single operation applied to one background segment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MixOp {
    /// Keep only `[start_secs, end_secs)` of the source
    Trim { start_secs: f64, end_secs: f64 },
    /// Delay the trimmed audio so it starts at `offset_secs` on the timeline
    Shift { offset_secs: f64 },
    /// Multiply samples by `factor`
    Gain { factor: f64 },
}

/// Operations realizing one audible background segment, in application order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentChain {
    pub ordinal: usize,
    pub source: PathBuf,
    pub ops: Vec<MixOp>,
}

/// How the main track reaches the output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum OutputRoute {
    /// No background survived clipping; the main track is passed through
    PassThrough { main_gain: f64 },
    /// Sum the listed background chains, then sum the result with the main track
    MixWithBackgrounds {
        backgrounds: Vec<usize>,
        main_gain: f64,
    },
}

/// The main track anchoring the timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainTrack {
    pub source: PathBuf,
    pub duration_secs: f64,
}

/// Complete, immutable description of one mix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixPlan {
    pub main: MainTrack,
    /// Every resolved segment in start-time order, including silent ones
    pub segments: Vec<ResolvedSegment>,
    /// One chain per audible segment, in the same order as `segments`
    pub chains: Vec<SegmentChain>,
    pub output: OutputRoute,
}

impl MixPlan {
    /// Whether the plan mixes in any background audio
    pub fn has_backgrounds(&self) -> bool {
        matches!(self.output, OutputRoute::MixWithBackgrounds { .. })
    }

    /// Look up the chain for a background ordinal
    pub fn chain(&self, ordinal: usize) -> Option<&SegmentChain> {
        self.chains.iter().find(|c| c.ordinal == ordinal)
    }

    /// Segments that were resolved to zero length
    pub fn silent_segments(&self) -> impl Iterator<Item = &ResolvedSegment> {
        self.segments.iter().filter(|s| !s.is_audible())
    }
}
