//! Core data model shared by the compositor stages

use serde::Serialize;
use std::path::PathBuf;

/// User-supplied placement hints for one background track.
///
/// Every field is advisory. `None` means the value was absent or could not be
/// read as a number; the reconciler substitutes a safe default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackHint {
    /// Intended start offset on the main track's timeline, in seconds
    pub timestamp: Option<f64>,
    /// Desired play length in seconds
    pub duration: Option<f64>,
    /// Linear gain multiplier
    pub volume: Option<f64>,
}

impl TrackHint {
    pub fn new(timestamp: Option<f64>, duration: Option<f64>, volume: Option<f64>) -> Self {
        Self {
            timestamp,
            duration,
            volume,
        }
    }
}

/// Result of probing one input
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedMedia {
    pub path: PathBuf,
    /// Duration in seconds, always > 0
    pub duration_secs: f64,
}

/// One background file submitted with the request
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundInput {
    pub path: PathBuf,
    pub hint: TrackHint,
}

impl BackgroundInput {
    pub fn new(path: impl Into<PathBuf>, hint: TrackHint) -> Self {
        Self {
            path: path.into(),
            hint,
        }
    }
}

/// A background track after its hints were reconciled with the probed length.
///
/// Invariant: `start_secs <= requested_end_secs <= main duration`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedTrack {
    /// Submission index among background inputs
    pub ordinal: usize,
    pub source: PathBuf,
    pub start_secs: f64,
    pub requested_end_secs: f64,
    pub volume: f64,
}

/// A placed track after clipping against its successor and the main track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSegment {
    pub ordinal: usize,
    pub source: PathBuf,
    pub start_secs: f64,
    pub requested_end_secs: f64,
    pub effective_end_secs: f64,
    pub volume: f64,
}

impl ResolvedSegment {
    /// Length actually played, never negative
    pub fn effective_duration_secs(&self) -> f64 {
        (self.effective_end_secs - self.start_secs).max(0.0)
    }

    /// Whether this segment contributes any audio to the mix
    pub fn is_audible(&self) -> bool {
        self.effective_duration_secs() > 0.0
    }
}

/// A background track removed from the batch because it could not be probed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedTrack {
    pub ordinal: usize,
    pub path: PathBuf,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64) -> ResolvedSegment {
        ResolvedSegment {
            ordinal: 0,
            source: PathBuf::from("bg.aac"),
            start_secs: start,
            requested_end_secs: end,
            effective_end_secs: end,
            volume: 1.0,
        }
    }

    #[test]
    fn test_effective_duration() {
        assert_eq!(segment(5.0, 12.5).effective_duration_secs(), 7.5);
        assert!(segment(5.0, 12.5).is_audible());
    }

    #[test]
    fn test_zero_length_segment_is_silent() {
        let s = segment(20.0, 20.0);
        assert_eq!(s.effective_duration_secs(), 0.0);
        assert!(!s.is_audible());
    }

    #[test]
    fn test_default_hint_is_empty() {
        let hint = TrackHint::default();
        assert_eq!(hint.timestamp, None);
        assert_eq!(hint.duration, None);
        assert_eq!(hint.volume, None);
    }
}
