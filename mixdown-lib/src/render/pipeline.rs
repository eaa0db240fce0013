//! FFmpeg renderer
//!
//! Decodes every plan input, feeds the frames through a libavfilter graph
//! built from [`filtergraph::encode`], and encodes the graph output to an
//! ADTS AAC file. The work runs on the blocking thread pool.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{FfmpegError, RenderError};
use crate::ffmpeg_utils::{ffmpeg, helpers};
use crate::render::decoder::AudioDecoder;
use crate::render::encoder::AacEncoder;
use crate::render::filtergraph::{self, FilterGraphSpec, OUTPUT_LABEL};
use crate::render::{
    CancelOnDrop, ProgressReporter, RenderJob, RenderSettings, RenderedMix, Renderer,
};

/// Renderer producing ADTS AAC via in-process FFmpeg
#[derive(Debug, Clone, Default)]
pub struct FfmpegRenderer {
    settings: RenderSettings,
}

impl FfmpegRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }
}

impl Renderer for FfmpegRenderer {
    async fn render(&self, job: RenderJob) -> Result<RenderedMix, RenderError> {
        let (_guard, cancel) = CancelOnDrop::new();
        let settings = self.settings.clone();

        tokio::task::spawn_blocking(move || render_blocking(&job, &settings, &cancel))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?
    }
}

/// Run one render to completion on the current thread.
///
/// Removes the output file if anything fails, including cancellation.
pub fn render_blocking(
    job: &RenderJob,
    settings: &RenderSettings,
    cancel: &AtomicBool,
) -> Result<RenderedMix, RenderError> {
    let started = std::time::Instant::now();
    let result = mix_to_file(job, settings, cancel);

    match &result {
        Ok(mix) => tracing::info!(
            output = ?mix.path,
            duration_secs = mix.duration_secs,
            bytes = mix.bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "render complete"
        ),
        Err(e) => {
            tracing::warn!(output = ?job.output, error = %e, "render failed");
            if let Err(rm) = std::fs::remove_file(&job.output) {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(output = ?job.output, error = %rm, "failed to remove partial output");
                }
            }
        }
    }

    result
}

fn mix_to_file(
    job: &RenderJob,
    settings: &RenderSettings,
    cancel: &AtomicBool,
) -> Result<RenderedMix, RenderError> {
    let spec = filtergraph::encode(&job.plan, settings);
    tracing::debug!(
        inputs = spec.sources.len(),
        graph = %spec.description,
        "rendering mix"
    );

    let mut inputs = spec
        .sources
        .iter()
        .map(|s| GraphInput::open(&s.label, &s.path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut encoder = AacEncoder::open(settings.sample_rate, settings.channels, settings.bitrate)?;
    let mut graph = build_graph(&spec, &inputs, encoder.frame_size())?;
    let mut writer = AdtsWriter::create(&job.output, &encoder)?;

    let mut progress = ProgressReporter::new(job.progress.clone());
    progress.report(0.0);

    let main_duration = job.plan.main.duration_secs;
    let rate = settings.sample_rate as f64;
    let mut samples_out: i64 = 0;
    let mut graph_done = false;

    while !graph_done {
        if cancel.load(Ordering::Relaxed) {
            return Err(RenderError::Cancelled);
        }

        let mut active = false;
        for input in inputs.iter_mut().filter(|i| !i.finished) {
            active = true;
            input.pump(&mut graph)?;
        }

        graph_done = drain_graph(&mut graph, &mut encoder, &mut writer, &mut samples_out)?;
        if main_duration > 0.0 {
            progress.report(samples_out as f64 / rate / main_duration);
        }

        if !active {
            break;
        }
    }

    encoder.send_eof()?;
    while let Some(packet) = encoder.receive_packet()? {
        writer.write(packet)?;
    }
    writer.finish()?;

    progress.report(1.0);

    let bytes = std::fs::metadata(&job.output)?.len();
    Ok(RenderedMix {
        path: job.output.clone(),
        duration_secs: samples_out as f64 / rate,
        bytes,
    })
}

/// Build the filter graph: one `abuffer` per input, the plan's filters, and
/// an `abuffersink` sized to the encoder's frame.
fn build_graph(
    spec: &FilterGraphSpec,
    inputs: &[GraphInput],
    frame_size: usize,
) -> Result<ffmpeg::filter::Graph, RenderError> {
    let graph_err = |what: &str, e: ffmpeg::Error| FfmpegError::FilterGraph(format!("{}: {}", what, e));

    let mut graph = ffmpeg::filter::Graph::new();
    let abuffer = ffmpeg::filter::find("abuffer")
        .ok_or_else(|| FfmpegError::FilterGraph("abuffer filter not available".into()))?;
    let abuffersink = ffmpeg::filter::find("abuffersink")
        .ok_or_else(|| FfmpegError::FilterGraph("abuffersink filter not available".into()))?;

    for input in inputs {
        graph
            .add(&abuffer, &input.label, &input.abuffer_args())
            .map_err(|e| graph_err(&format!("add source {}", input.label), e))?;
    }
    graph
        .add(&abuffersink, OUTPUT_LABEL, "")
        .map_err(|e| graph_err("add sink", e))?;

    let labels: Vec<&str> = inputs.iter().map(|i| i.label.as_str()).collect();
    helpers::parse_filter_graph(&mut graph, &labels, OUTPUT_LABEL, &spec.description)
        .map_err(|e| graph_err("parse", e))?;
    graph.validate().map_err(|e| graph_err("validate", e))?;

    if let Some(mut sink) = graph.get(OUTPUT_LABEL) {
        sink.sink().set_frame_size(frame_size as u32);
    }

    Ok(graph)
}

/// Pull every available frame from the graph into the encoder.
///
/// Returns `true` once the graph has signalled end of stream.
fn drain_graph(
    graph: &mut ffmpeg::filter::Graph,
    encoder: &mut AacEncoder,
    writer: &mut AdtsWriter,
    samples_out: &mut i64,
) -> Result<bool, RenderError> {
    let mut frame = ffmpeg::util::frame::Audio::empty();
    loop {
        let pulled = {
            let mut sink = graph
                .get(OUTPUT_LABEL)
                .ok_or_else(|| FfmpegError::FilterGraph("sink disappeared".into()))?;
            sink.sink().frame(&mut frame)
        };

        match pulled {
            Ok(()) => {
                frame.set_pts(Some(*samples_out));
                *samples_out += frame.samples() as i64;
                encoder.send_frame(&frame)?;
                while let Some(packet) = encoder.receive_packet()? {
                    writer.write(packet)?;
                }
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                return Ok(false)
            }
            Err(ffmpeg::Error::Eof) => return Ok(true),
            Err(e) => {
                return Err(FfmpegError::FilterGraph(format!("sink read: {}", e)).into())
            }
        }
    }
}

/// One demuxed and decoded file feeding a graph source
struct GraphInput {
    label: String,
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    time_base: ffmpeg::Rational,
    decoder: AudioDecoder,
    finished: bool,
}

impl GraphInput {
    fn open(label: &str, path: &Path) -> Result<Self, RenderError> {
        let input = ffmpeg::format::input(&path)
            .map_err(|e| FfmpegError::OpenInput(format!("{:?}: {}", path, e)))?;

        let (time_base, decoder) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Audio)
                .ok_or_else(|| RenderError::MissingAudio {
                    path: path.to_path_buf(),
                })?;
            (stream.time_base(), AudioDecoder::open(&stream)?)
        };

        Ok(Self {
            label: label.to_string(),
            path: path.to_path_buf(),
            input,
            time_base,
            decoder,
            finished: false,
        })
    }

    fn abuffer_args(&self) -> String {
        source_args(
            self.time_base,
            self.decoder.sample_rate(),
            self.decoder.format().name(),
            self.decoder.channel_layout(),
            self.decoder.channels(),
        )
    }

    /// Decode the next packet of this input into the graph, or flush the
    /// input at end of file.
    fn pump(&mut self, graph: &mut ffmpeg::filter::Graph) -> Result<(), RenderError> {
        let mut packet = ffmpeg::Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.decoder.stream_index() {
                        continue;
                    }
                    self.decoder.send_packet(&packet)?;
                    return self.push_decoded(graph);
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder.send_eof()?;
                    self.push_decoded(graph)?;
                    if !self.finished {
                        self.close(graph)?;
                    }
                    return Ok(());
                }
                Err(e) => {
                    return Err(FfmpegError::ReadPacket(format!("{:?}: {}", self.path, e)).into())
                }
            }
        }
    }

    fn push_decoded(&mut self, graph: &mut ffmpeg::filter::Graph) -> Result<(), RenderError> {
        while let Some(mut frame) = self.decoder.receive_frame()? {
            if self.finished {
                continue;
            }
            let ts = frame.timestamp();
            frame.set_pts(ts);

            let added = {
                let mut source = graph.get(&self.label).ok_or_else(|| {
                    FfmpegError::FilterGraph(format!("source {} disappeared", self.label))
                })?;
                source.source().add(&frame)
            };

            match added {
                Ok(()) => {}
                // Downstream no longer wants this input (trimmed or mix ended).
                Err(ffmpeg::Error::Eof) => {
                    tracing::trace!(input = %self.label, "graph input closed early");
                    self.finished = true;
                }
                Err(e) => {
                    return Err(FfmpegError::FilterGraph(format!(
                        "push to {}: {}",
                        self.label, e
                    ))
                    .into())
                }
            }
        }
        Ok(())
    }

    fn close(&mut self, graph: &mut ffmpeg::filter::Graph) -> Result<(), RenderError> {
        self.finished = true;
        let flushed = {
            let mut source = graph.get(&self.label).ok_or_else(|| {
                FfmpegError::FilterGraph(format!("source {} disappeared", self.label))
            })?;
            source.source().flush()
        };
        match flushed {
            Ok(()) | Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(FfmpegError::FilterGraph(format!("flush {}: {}", self.label, e)).into()),
        }
    }
}

/// `abuffer` arguments for one decoded input. A layout FFmpeg cannot name is
/// described by its channel count alone.
fn source_args(
    time_base: ffmpeg::Rational,
    sample_rate: u32,
    sample_fmt: &str,
    layout: ffmpeg::ChannelLayout,
    channels: u16,
) -> String {
    let layout = if layout.bits() != 0 {
        format!("channel_layout=0x{:x}", layout.bits())
    } else {
        format!("channels={}", channels)
    };
    format!(
        "time_base={}/{}:sample_rate={}:sample_fmt={}:{}",
        time_base.numerator(),
        time_base.denominator(),
        sample_rate,
        sample_fmt,
        layout
    )
}

/// ADTS muxer for the encoded mix
pub(crate) struct AdtsWriter {
    output: ffmpeg::format::context::Output,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
}

impl AdtsWriter {
    pub(crate) fn create(path: &Path, encoder: &AacEncoder) -> Result<Self, RenderError> {
        let mut output = ffmpeg::format::output_as(&path, "adts")
            .map_err(|e| FfmpegError::MuxerCreate(format!("{:?}: {}", path, e)))?;

        {
            let mut stream = output
                .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::AAC))
                .map_err(|e| FfmpegError::MuxerCreate(format!("add stream: {}", e)))?;
            stream.set_parameters(encoder.codec_parameters());
            stream.set_time_base(encoder.output_timebase());
            helpers::stream_reset_codec_tag(&mut stream);
        }

        output
            .write_header()
            .map_err(|e| FfmpegError::WriteHeader(e.to_string()))?;

        let stream_time_base = output
            .stream(0)
            .map(|s| s.time_base())
            .unwrap_or_else(|| encoder.output_timebase());

        Ok(Self {
            output,
            encoder_time_base: encoder.output_timebase(),
            stream_time_base,
        })
    }

    pub(crate) fn write(&mut self, mut packet: ffmpeg::Packet) -> Result<(), RenderError> {
        packet.set_stream(0);
        packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
        packet
            .write_interleaved(&mut self.output)
            .map_err(|e| FfmpegError::WritePacket(e.to_string()).into())
    }

    pub(crate) fn finish(mut self) -> Result<(), RenderError> {
        self.output
            .write_trailer()
            .map_err(|e| FfmpegError::WriteTrailer(e.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan;
    use crate::tests::fixtures::write_tone;
    use crate::types::ResolvedSegment;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_source_args_follow_channel_layout() {
        let tb = ffmpeg::Rational::new(1, 48_000);
        assert_eq!(
            source_args(tb, 48_000, "fltp", ffmpeg::ChannelLayout::STEREO, 2),
            "time_base=1/48000:sample_rate=48000:sample_fmt=fltp:channel_layout=0x3"
        );
        assert_eq!(
            source_args(tb, 48_000, "s16", ffmpeg::ChannelLayout::_5POINT1, 6),
            "time_base=1/48000:sample_rate=48000:sample_fmt=s16:channel_layout=0x60f"
        );
        assert_eq!(
            source_args(tb, 48_000, "fltp", ffmpeg::ChannelLayout::empty(), 9),
            "time_base=1/48000:sample_rate=48000:sample_fmt=fltp:channels=9"
        );
    }

    fn segment(ordinal: usize, source: PathBuf, start: f64, end: f64) -> ResolvedSegment {
        ResolvedSegment {
            ordinal,
            source,
            start_secs: start,
            requested_end_secs: end,
            effective_end_secs: end,
            volume: 0.5,
        }
    }

    #[test]
    fn test_render_mix_matches_main_length() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.aac");
        let bg0 = dir.path().join("bg0.aac");
        let bg1 = dir.path().join("bg1.aac");
        write_tone(&main, 3.0, 440.0);
        write_tone(&bg0, 2.0, 220.0);
        write_tone(&bg1, 2.0, 330.0);

        let plan = plan::build(
            main.clone(),
            3.0,
            vec![segment(0, bg0, 0.0, 1.0), segment(1, bg1, 1.0, 3.0)],
        );
        let output = dir.path().join("mix.aac");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let job = RenderJob::new(plan, output.clone())
            .with_progress(Arc::new(move |f| sink.lock().unwrap().push(f)));

        let mix = render_blocking(&job, &RenderSettings::default(), &AtomicBool::new(false))
            .unwrap();

        assert_eq!(mix.path, output);
        assert!(mix.bytes > 0);
        assert!((mix.duration_secs - 3.0).abs() < 0.1, "{}", mix.duration_secs);

        let probed = crate::probe::probe_file(&output).unwrap();
        assert!((probed.duration_secs - 3.0).abs() < 0.2);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_render_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.aac");
        write_tone(&main, 1.5, 440.0);

        let plan = plan::build(main, 1.5, Vec::new());
        let output = dir.path().join("mix.aac");
        let mix = render_blocking(
            &RenderJob::new(plan, output.clone()),
            &RenderSettings::default(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert!((mix.duration_secs - 1.5).abs() < 0.1);
        assert!(output.exists());
    }

    #[test]
    fn test_cancelled_render_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.aac");
        write_tone(&main, 1.0, 440.0);

        let plan = plan::build(main, 1.0, Vec::new());
        let output = dir.path().join("mix.aac");
        let result = render_blocking(
            &RenderJob::new(plan, output.clone()),
            &RenderSettings::default(),
            &AtomicBool::new(true),
        );
        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_input_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        crate::ffmpeg_utils::init().unwrap();
        let plan = plan::build(dir.path().join("absent.aac"), 5.0, Vec::new());
        let output = dir.path().join("mix.aac");
        let result = render_blocking(
            &RenderJob::new(plan, output.clone()),
            &RenderSettings::default(),
            &AtomicBool::new(false),
        );
        assert!(matches!(
            result,
            Err(RenderError::Ffmpeg(FfmpegError::OpenInput(_)))
        ));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_async_render() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.aac");
        write_tone(&main, 1.0, 440.0);

        let renderer = FfmpegRenderer::default();
        let plan = plan::build(main, 1.0, Vec::new());
        let mix = renderer
            .render(RenderJob::new(plan, dir.path().join("out.aac")))
            .await
            .unwrap();
        assert!(mix.bytes > 0);
    }
}
