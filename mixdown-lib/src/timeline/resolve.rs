//! Overlap resolver - clips placed tracks so backgrounds never overlap
//!
//! A later-starting background always wins over the tail of an earlier one.
//! Only the main track may overlap a background.

use crate::types::{PlacedTrack, ResolvedSegment};

/// Order placed tracks by start time and clip each against its successor.
///
/// The last segment is clipped against `main_duration_secs`. Segments that
/// end up with zero length are kept.
pub fn resolve(placed: &[PlacedTrack], main_duration_secs: f64) -> Vec<ResolvedSegment> {
    let mut ordered: Vec<&PlacedTrack> = placed.iter().collect();
    // sort_by is stable, so equal start times keep submission order
    ordered.sort_by(|a, b| {
        a.start_secs
            .total_cmp(&b.start_secs)
            .then(a.ordinal.cmp(&b.ordinal))
    });

    let mut segments = Vec::with_capacity(ordered.len());
    for (i, track) in ordered.iter().enumerate() {
        let boundary = match ordered.get(i + 1) {
            Some(next) => next.start_secs.min(main_duration_secs),
            None => main_duration_secs,
        };
        let effective_end_secs = track.requested_end_secs.min(boundary).max(track.start_secs);

        if effective_end_secs < track.requested_end_secs {
            tracing::debug!(
                ordinal = track.ordinal,
                requested_end = track.requested_end_secs,
                effective_end = effective_end_secs,
                "clipped background track"
            );
        }

        segments.push(ResolvedSegment {
            ordinal: track.ordinal,
            source: track.source.clone(),
            start_secs: track.start_secs,
            requested_end_secs: track.requested_end_secs,
            effective_end_secs,
            volume: track.volume,
        });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn placed(ordinal: usize, start: f64, end: f64) -> PlacedTrack {
        PlacedTrack {
            ordinal,
            source: PathBuf::from(format!("bg{}.aac", ordinal)),
            start_secs: start,
            requested_end_secs: end,
            volume: 1.0,
        }
    }

    fn assert_non_overlapping(segments: &[ResolvedSegment], main: f64) {
        for s in segments {
            assert!(s.start_secs <= s.effective_end_secs);
            assert!(s.effective_end_secs <= main);
        }
        for pair in segments.windows(2) {
            assert!(pair[0].effective_end_secs <= pair[1].start_secs);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(resolve(&[], 20.0).is_empty());
    }

    #[test]
    fn test_earlier_track_clipped_by_next_start() {
        let segments = resolve(&[placed(0, 0.0, 15.0), placed(1, 10.0, 20.0)], 20.0);
        assert_eq!(segments[0].effective_end_secs, 10.0);
        assert_eq!(segments[1].effective_end_secs, 20.0);
        assert_non_overlapping(&segments, 20.0);
    }

    #[test]
    fn test_sorted_by_start_time() {
        let segments = resolve(
            &[placed(0, 12.0, 18.0), placed(1, 2.0, 6.0), placed(2, 7.0, 9.0)],
            30.0,
        );
        let order: Vec<usize> = segments.iter().map(|s| s.ordinal).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_non_overlapping(&segments, 30.0);
    }

    #[test]
    fn test_ties_keep_submission_order() {
        let segments = resolve(&[placed(0, 5.0, 9.0), placed(1, 5.0, 8.0)], 30.0);
        assert_eq!(segments[0].ordinal, 0);
        assert_eq!(segments[1].ordinal, 1);
        // The first of a tied pair is clipped to nothing
        assert_eq!(segments[0].effective_duration_secs(), 0.0);
        assert_eq!(segments[1].effective_end_secs, 8.0);
    }

    #[test]
    fn test_zero_length_segment_kept() {
        let segments = resolve(&[placed(0, 0.0, 5.0), placed(1, 20.0, 20.0)], 20.0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].effective_duration_secs(), 0.0);
        assert_non_overlapping(&segments, 20.0);
    }

    #[test]
    fn test_short_track_not_extended() {
        let segments = resolve(&[placed(0, 0.0, 3.0), placed(1, 10.0, 12.0)], 20.0);
        assert_eq!(segments[0].effective_end_secs, 3.0);
        assert_eq!(segments[1].effective_end_secs, 12.0);
    }

    #[test]
    fn test_many_tracks_never_overlap() {
        let tracks: Vec<PlacedTrack> = (0..10)
            .map(|i| {
                let start = ((i * 7) % 10) as f64 * 2.5;
                placed(i, start, (start + 9.0).min(25.0))
            })
            .collect();
        let segments = resolve(&tracks, 25.0);
        assert_eq!(segments.len(), 10);
        assert_non_overlapping(&segments, 25.0);
    }
}
