//! Mix plan builder

use std::path::PathBuf;

use super::{MainTrack, MixOp, MixPlan, OutputRoute, SegmentChain, MAIN_GAIN};
use crate::types::ResolvedSegment;

/// Build the mix plan for a main track and its resolved background segments.
///
/// Total over its input: silent segments are carried in `segments` but get no
/// chain, and when nothing is audible the main track is passed through.
pub fn build(
    main_source: PathBuf,
    main_duration_secs: f64,
    segments: Vec<ResolvedSegment>,
) -> MixPlan {
    let chains: Vec<SegmentChain> = segments
        .iter()
        .filter(|s| s.is_audible())
        .map(|s| SegmentChain {
            ordinal: s.ordinal,
            source: s.source.clone(),
            ops: vec![
                MixOp::Trim {
                    start_secs: 0.0,
                    end_secs: s.effective_duration_secs(),
                },
                MixOp::Shift {
                    offset_secs: s.start_secs,
                },
                MixOp::Gain { factor: s.volume },
            ],
        })
        .collect();

    let output = if chains.is_empty() {
        OutputRoute::PassThrough {
            main_gain: MAIN_GAIN,
        }
    } else {
        OutputRoute::MixWithBackgrounds {
            backgrounds: chains.iter().map(|c| c.ordinal).collect(),
            main_gain: MAIN_GAIN,
        }
    };

    tracing::debug!(
        segments = segments.len(),
        audible = chains.len(),
        "built mix plan"
    );

    MixPlan {
        main: MainTrack {
            source: main_source,
            duration_secs: main_duration_secs,
        },
        segments,
        chains,
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(ordinal: usize, start: f64, end: f64, volume: f64) -> ResolvedSegment {
        ResolvedSegment {
            ordinal,
            source: PathBuf::from(format!("bg{}.aac", ordinal)),
            start_secs: start,
            requested_end_secs: end,
            effective_end_secs: end,
            volume,
        }
    }

    #[test]
    fn test_chain_ops_in_order() {
        let plan = build(
            PathBuf::from("main.aac"),
            30.0,
            vec![segment(0, 5.0, 12.0, 0.5)],
        );

        assert_eq!(plan.chains.len(), 1);
        assert_eq!(
            plan.chains[0].ops,
            vec![
                MixOp::Trim {
                    start_secs: 0.0,
                    end_secs: 7.0
                },
                MixOp::Shift { offset_secs: 5.0 },
                MixOp::Gain { factor: 0.5 },
            ]
        );
        assert_eq!(
            plan.output,
            OutputRoute::MixWithBackgrounds {
                backgrounds: vec![0],
                main_gain: 1.0
            }
        );
    }

    #[test]
    fn test_silent_segments_excluded_from_combine() {
        let plan = build(
            PathBuf::from("main.aac"),
            20.0,
            vec![segment(1, 0.0, 10.0, 1.0), segment(0, 20.0, 20.0, 1.0)],
        );

        assert_eq!(plan.segments.len(), 2);
        assert_eq!(plan.chains.len(), 1);
        assert!(plan.chain(0).is_none());
        assert!(plan.chain(1).is_some());
        assert_eq!(plan.silent_segments().count(), 1);
        match &plan.output {
            OutputRoute::MixWithBackgrounds { backgrounds, .. } => {
                assert_eq!(backgrounds, &vec![1])
            }
            other => panic!("unexpected route {:?}", other),
        }
    }

    #[test]
    fn test_no_audible_segments_passes_main_through() {
        let plan = build(
            PathBuf::from("main.aac"),
            20.0,
            vec![segment(0, 20.0, 20.0, 1.0)],
        );
        assert!(plan.chains.is_empty());
        assert!(!plan.has_backgrounds());
        assert_eq!(plan.output, OutputRoute::PassThrough { main_gain: 1.0 });
    }

    #[test]
    fn test_empty_input_passes_main_through() {
        let plan = build(PathBuf::from("main.aac"), 20.0, Vec::new());
        assert!(plan.segments.is_empty());
        assert_eq!(plan.output, OutputRoute::PassThrough { main_gain: 1.0 });
        assert_eq!(plan.main.duration_secs, 20.0);
    }
}
