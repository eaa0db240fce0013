use std::path::PathBuf;

use thiserror::Error;

/// Umbrella error for a full compose-and-render request
#[derive(Error, Debug)]
pub enum MixError {
    /// The caller-supplied hint payload could not be parsed
    #[error("Invalid background audio metadata: {0}")]
    Metadata(#[from] MetadataFormatError),

    /// Orchestration failed before a plan could be rendered
    #[error("Composition failed: {0}")]
    Composition(#[from] CompositionError),

    /// The renderer failed while executing a plan
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
}

/// The inspection capability could not determine a file's duration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// The container could not be opened or parsed
    #[error("cannot open {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// The file has no audio stream
    #[error("no audio stream in {path:?}")]
    NoAudioStream { path: PathBuf },

    /// Neither the container nor the audio stream reports a usable duration
    #[error("no usable duration for {path:?}")]
    NoDuration { path: PathBuf },

    /// The probe did not finish within the configured limit
    #[error("probing {path:?} timed out after {secs}s")]
    Timeout { path: PathBuf, secs: u64 },

    /// The inspection capability itself is not available
    #[error("media inspection unavailable: {0}")]
    Unavailable(String),
}

/// The hint payload is not shaped like a list of hint objects
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}")]
pub struct MetadataFormatError {
    pub reason: String,
}

impl MetadataFormatError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Orchestration-level failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositionError {
    /// The main track could not be probed, so there is no timeline
    #[error("main track probe failed: {0}")]
    MainProbeFailed(#[source] ProbeError),

    /// Background tracks were supplied but none of them could be probed
    #[error("none of the {supplied} background track(s) could be used")]
    NoUsableBackgrounds { supplied: usize },
}

/// Renderer failures. Always fatal for the request.
#[derive(Error, Debug)]
pub enum RenderError {
    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error on the output destination
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An input referenced by the plan has no decodable audio
    #[error("input {path:?} has no decodable audio stream")]
    MissingAudio { path: PathBuf },

    /// The render did not finish within the configured limit
    #[error("render timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The render was abandoned by its caller
    #[error("render cancelled")]
    Cancelled,

    /// The blocking render task panicked or was aborted
    #[error("render task failed: {0}")]
    Task(String),
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// Failure opening an input media file
    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    /// Failure instantiating a decoder
    #[error("Failed to create decoder: {0}")]
    DecoderCreate(String),

    /// The requested encoder was not found
    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    /// Failure instantiating or opening an encoder
    #[error("Failed to create encoder: {0}")]
    EncoderCreate(String),

    /// Failure building, validating or driving the filter graph
    #[error("Filter graph error: {0}")]
    FilterGraph(String),

    /// Failure creating an output format muxer
    #[error("Failed to create muxer: {0}")]
    MuxerCreate(String),

    /// Failure writing the container header
    #[error("Failed to write header: {0}")]
    WriteHeader(String),

    /// Failure writing a media packet to the container
    #[error("Failed to write packet: {0}")]
    WritePacket(String),

    /// Failure writing the container trailer
    #[error("Failed to write trailer: {0}")]
    WriteTrailer(String),

    /// Failure decoding a single packet into a frame
    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    /// Failure encoding a single frame into a packet
    #[error("Failed to encode frame: {0}")]
    EncodeFrame(String),

    /// Failure reading a packet from the input context
    #[error("Failed to read packet: {0}")]
    ReadPacket(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_probe_failure_keeps_cause() {
        let err = CompositionError::MainProbeFailed(ProbeError::NoAudioStream {
            path: PathBuf::from("/uploads/main.aac"),
        });
        let msg = err.to_string();
        assert!(msg.contains("main track probe failed"));
        assert!(msg.contains("main.aac"));
    }

    #[test]
    fn test_mix_error_from_render() {
        let err: MixError = RenderError::Timeout { secs: 600 }.into();
        assert!(matches!(err, MixError::Render(RenderError::Timeout { secs: 600 })));
        assert_eq!(err.to_string(), "Render failed: render timed out after 600s");
    }

    #[test]
    fn test_metadata_error_display() {
        let err: MixError = MetadataFormatError::new("expected a JSON array").into();
        assert_eq!(
            err.to_string(),
            "Invalid background audio metadata: expected a JSON array"
        );
    }
}
