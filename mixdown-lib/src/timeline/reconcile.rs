//! Track reconciler - turns hints plus a probed duration into a placement

use crate::types::{PlacedTrack, ProbedMedia, TrackHint};

/// Gain used when a hint carries no usable volume
pub const DEFAULT_VOLUME: f64 = 1.0;

/// Place one background track on the main track's timeline.
///
/// Never fails: malformed numeric hints fall back to defaults so that one bad
/// entry cannot abort the batch.
pub fn reconcile(
    hint: &TrackHint,
    probed: &ProbedMedia,
    main_duration_secs: f64,
    ordinal: usize,
) -> PlacedTrack {
    let main_duration = main_duration_secs.max(0.0);

    let start_secs = match hint.timestamp {
        Some(t) if t.is_finite() => t.clamp(0.0, main_duration),
        _ => 0.0,
    };

    let volume = reconcile_volume(hint.volume);

    // A zero or negative request means "play the whole file"
    let candidate = match hint.duration {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => probed.duration_secs,
    };

    let length = probed
        .duration_secs
        .min(candidate)
        .min(main_duration - start_secs)
        .max(0.0);

    tracing::debug!(
        ordinal,
        path = ?probed.path,
        start_secs,
        length,
        volume,
        "placed background track"
    );

    PlacedTrack {
        ordinal,
        source: probed.path.clone(),
        start_secs,
        requested_end_secs: start_secs + length,
        volume,
    }
}

/// Clamp a hinted gain into `[0, 1]`, defaulting to unity.
pub fn reconcile_volume(volume: Option<f64>) -> f64 {
    match volume {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => DEFAULT_VOLUME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn probed(duration: f64) -> ProbedMedia {
        ProbedMedia {
            path: PathBuf::from("bg.aac"),
            duration_secs: duration,
        }
    }

    #[test]
    fn test_defaults_use_full_probed_length() {
        let placed = reconcile(&TrackHint::default(), &probed(12.0), 30.0, 0);
        assert_eq!(placed.start_secs, 0.0);
        assert_eq!(placed.requested_end_secs, 12.0);
        assert_eq!(placed.volume, 1.0);
        assert_eq!(placed.source, PathBuf::from("bg.aac"));
    }

    #[test]
    fn test_requested_duration_shortens() {
        let hint = TrackHint::new(Some(4.0), Some(3.0), Some(0.5));
        let placed = reconcile(&hint, &probed(12.0), 30.0, 2);
        assert_eq!(placed.ordinal, 2);
        assert_eq!(placed.start_secs, 4.0);
        assert_eq!(placed.requested_end_secs, 7.0);
        assert_eq!(placed.volume, 0.5);
    }

    #[test]
    fn test_requested_duration_never_exceeds_probe() {
        let hint = TrackHint::new(Some(0.0), Some(50.0), None);
        let placed = reconcile(&hint, &probed(8.0), 30.0, 0);
        assert_eq!(placed.requested_end_secs, 8.0);
    }

    #[test]
    fn test_capped_by_main_duration() {
        let hint = TrackHint::new(Some(5.0), None, Some(2.0));
        let placed = reconcile(&hint, &probed(40.0), 30.0, 0);
        assert_eq!(placed.requested_end_secs, 30.0);
        assert_eq!(placed.volume, 1.0);
    }

    #[test]
    fn test_start_past_main_contributes_nothing() {
        let hint = TrackHint::new(Some(25.0), None, None);
        let placed = reconcile(&hint, &probed(10.0), 20.0, 0);
        assert_eq!(placed.start_secs, 20.0);
        assert_eq!(placed.requested_end_secs, 20.0);
    }

    #[test]
    fn test_negative_timestamp_clamps_to_zero() {
        let hint = TrackHint::new(Some(-3.0), None, None);
        let placed = reconcile(&hint, &probed(10.0), 20.0, 0);
        assert_eq!(placed.start_secs, 0.0);
        assert_eq!(placed.requested_end_secs, 10.0);
    }

    #[test]
    fn test_zero_duration_request_means_full_length() {
        let hint = TrackHint::new(Some(2.0), Some(0.0), None);
        let placed = reconcile(&hint, &probed(6.0), 20.0, 0);
        assert_eq!(placed.requested_end_secs, 8.0);
    }

    #[test]
    fn test_non_finite_hints_degrade() {
        let hint = TrackHint::new(Some(f64::NAN), Some(f64::INFINITY), Some(f64::NAN));
        let placed = reconcile(&hint, &probed(6.0), 20.0, 0);
        assert_eq!(placed.start_secs, 0.0);
        assert_eq!(placed.requested_end_secs, 6.0);
        assert_eq!(placed.volume, 1.0);
    }

    #[test]
    fn test_volume_clamp_law() {
        for v in [-4.0, -0.1, 0.0, 0.25, 1.0, 1.5, 100.0] {
            let r = reconcile_volume(Some(v));
            assert!((0.0..=1.0).contains(&r), "volume {} resolved to {}", v, r);
        }
        assert_eq!(reconcile_volume(Some(0.0)), 0.0);
        assert_eq!(reconcile_volume(Some(0.25)), 0.25);
        assert_eq!(reconcile_volume(None), 1.0);
        assert_eq!(reconcile_volume(Some(f64::NAN)), 1.0);
    }
}
