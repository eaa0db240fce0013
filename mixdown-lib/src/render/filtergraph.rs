//! Translation of a [`MixPlan`] into libavfilter graph syntax
//!
//! Every graph input is named after its role: `main` for the main track and
//! `bg{ordinal}` for each audible background chain. The graph always ends in
//! a single `out` pad in the encoder's sample format.

use std::path::PathBuf;

use crate::plan::{MixOp, MixPlan, OutputRoute, SegmentChain};
use crate::render::RenderSettings;

/// Label of the main track's graph input
pub const MAIN_LABEL: &str = "main";
/// Label of the graph's single output
pub const OUTPUT_LABEL: &str = "out";

/// One file feeding the graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSource {
    pub label: String,
    pub path: PathBuf,
}

/// A complete graph: its inputs, in order, and the filter description
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraphSpec {
    pub sources: Vec<GraphSource>,
    pub description: String,
}

pub fn background_label(ordinal: usize) -> String {
    format!("bg{}", ordinal)
}

/// Encode `plan` as a filter graph description.
pub fn encode(plan: &MixPlan, settings: &RenderSettings) -> FilterGraphSpec {
    let mut sources = vec![GraphSource {
        label: MAIN_LABEL.to_string(),
        path: plan.main.source.clone(),
    }];
    let format = output_format(settings);

    let description = match &plan.output {
        OutputRoute::PassThrough { main_gain } => {
            format!(
                "[{}]volume={},{}[{}]",
                MAIN_LABEL, main_gain, format, OUTPUT_LABEL
            )
        }
        OutputRoute::MixWithBackgrounds {
            backgrounds,
            main_gain,
        } => {
            let mut parts = Vec::with_capacity(backgrounds.len() + 3);
            let mut mixed_labels = String::new();

            for chain in backgrounds.iter().filter_map(|o| plan.chain(*o)) {
                let label = background_label(chain.ordinal);
                sources.push(GraphSource {
                    label: label.clone(),
                    path: chain.source.clone(),
                });
                parts.push(format!("[{}]{}[{}_out]", label, chain_filters(chain), label));
                mixed_labels.push_str(&format!("[{}_out]", label));
            }

            parts.push(format!(
                "{}amix=inputs={}:duration=longest:dropout_transition=0:normalize=0[bgmix]",
                mixed_labels,
                sources.len() - 1
            ));
            parts.push(format!("[{}]volume={}[main_out]", MAIN_LABEL, main_gain));
            parts.push(format!(
                "[main_out][bgmix]amix=inputs=2:duration=first:dropout_transition=0:normalize=0,{}[{}]",
                format, OUTPUT_LABEL
            ));
            parts.join(";")
        }
    };

    FilterGraphSpec {
        sources,
        description,
    }
}

fn chain_filters(chain: &SegmentChain) -> String {
    chain
        .ops
        .iter()
        .map(op_filter)
        .collect::<Vec<_>>()
        .join(",")
}

fn op_filter(op: &MixOp) -> String {
    match op {
        MixOp::Trim {
            start_secs,
            end_secs,
        } => format!(
            "atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS",
            start_secs, end_secs
        ),
        MixOp::Shift { offset_secs } => {
            format!(
                "adelay=delays={}:all=1",
                (offset_secs.max(0.0) * 1000.0).round() as u64
            )
        }
        MixOp::Gain { factor } => format!("volume={}", factor),
    }
}

fn output_format(settings: &RenderSettings) -> String {
    let layout = if settings.channels == 1 {
        "mono"
    } else {
        "stereo"
    };
    format!(
        "aformat=sample_fmts=fltp:sample_rates={}:channel_layouts={}",
        settings.sample_rate, layout
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan;
    use crate::types::ResolvedSegment;

    fn segment(ordinal: usize, start: f64, end: f64, volume: f64) -> ResolvedSegment {
        ResolvedSegment {
            ordinal,
            source: PathBuf::from(format!("/tmp/bg{}.mp3", ordinal)),
            start_secs: start,
            requested_end_secs: end,
            effective_end_secs: end,
            volume,
        }
    }

    #[test]
    fn test_pass_through() {
        let plan = plan::build(PathBuf::from("/tmp/main.aac"), 30.0, Vec::new());
        let spec = encode(&plan, &RenderSettings::default());

        assert_eq!(spec.sources.len(), 1);
        assert_eq!(spec.sources[0].label, "main");
        assert_eq!(
            spec.description,
            "[main]volume=1,aformat=sample_fmts=fltp:sample_rates=44100:channel_layouts=stereo[out]"
        );
    }

    #[test]
    fn test_two_backgrounds() {
        let plan = plan::build(
            PathBuf::from("/tmp/main.aac"),
            30.0,
            vec![segment(1, 0.0, 5.0, 0.5), segment(0, 5.0, 12.5, 1.0)],
        );
        let spec = encode(&plan, &RenderSettings::default());

        let labels: Vec<&str> = spec.sources.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["main", "bg1", "bg0"]);
        assert_eq!(spec.sources[2].path, PathBuf::from("/tmp/bg0.mp3"));

        let expected = [
            "[bg1]atrim=start=0.000:end=5.000,asetpts=PTS-STARTPTS,adelay=delays=0:all=1,volume=0.5[bg1_out]",
            "[bg0]atrim=start=0.000:end=7.500,asetpts=PTS-STARTPTS,adelay=delays=5000:all=1,volume=1[bg0_out]",
            "[bg1_out][bg0_out]amix=inputs=2:duration=longest:dropout_transition=0:normalize=0[bgmix]",
            "[main]volume=1[main_out]",
            "[main_out][bgmix]amix=inputs=2:duration=first:dropout_transition=0:normalize=0,aformat=sample_fmts=fltp:sample_rates=44100:channel_layouts=stereo[out]",
        ]
        .join(";");
        assert_eq!(spec.description, expected);
    }

    #[test]
    fn test_silent_segment_has_no_input() {
        let plan = plan::build(
            PathBuf::from("/tmp/main.aac"),
            10.0,
            vec![segment(0, 0.0, 10.0, 0.8), segment(1, 10.0, 10.0, 1.0)],
        );
        let spec = encode(&plan, &RenderSettings::default());
        assert_eq!(spec.sources.len(), 2);
        assert!(!spec.description.contains("[bg1]"));
        assert!(spec.description.contains("amix=inputs=1:"));
    }

    #[test]
    fn test_mono_output_format() {
        let plan = plan::build(PathBuf::from("/tmp/main.aac"), 30.0, Vec::new());
        let settings = RenderSettings {
            sample_rate: 48_000,
            channels: 1,
            bitrate: 96_000,
        };
        let spec = encode(&plan, &settings);
        assert!(spec
            .description
            .ends_with("aformat=sample_fmts=fltp:sample_rates=48000:channel_layouts=mono[out]"));
    }
}
