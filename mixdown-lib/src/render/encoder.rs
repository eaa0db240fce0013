//! AAC encoder for the rendered mix
//!
//! Encodes the filter graph's FLTP output frames to AAC-LC packets.

use crate::error::{FfmpegError, RenderError};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

/// Sample format the AAC encoder consumes
pub const ENCODER_SAMPLE_FMT: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);
/// AAC frame size (samples per channel per frame)
pub const AAC_FRAME_SIZE: usize = 1024;

pub struct AacEncoder {
    encoder: ffmpeg::encoder::Audio,
    frame_size: usize,
    output_timebase: ffmpeg::Rational,
    pts: i64,
}

impl AacEncoder {
    /// Open an AAC encoder at the given parameters.
    pub fn open(sample_rate: u32, channels: u16, bitrate: u64) -> Result<Self, RenderError> {
        let codec = codec::encoder::find(codec::Id::AAC).ok_or_else(|| {
            FfmpegError::EncoderNotFound("AAC encoder not found in this FFmpeg build".into())
        })?;

        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(ffmpeg::Rational::new(1, sample_rate as i32));

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            FfmpegError::EncoderCreate(format!("Cannot get audio encoder handle: {}", e))
        })?;

        audio_enc.set_rate(sample_rate as i32);
        audio_enc.set_format(ENCODER_SAMPLE_FMT);
        audio_enc.set_channel_layout(channel_layout_for(channels));
        audio_enc.set_bit_rate(bitrate as usize);

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            FfmpegError::EncoderCreate(format!("Failed to open AAC encoder: {}", e))
        })?;

        let frame_size = encoder.frame_size() as usize;

        Ok(Self {
            encoder,
            frame_size: if frame_size == 0 {
                AAC_FRAME_SIZE
            } else {
                frame_size
            },
            output_timebase: ffmpeg::Rational::new(1, sample_rate as i32),
            pts: 0,
        })
    }

    pub fn send_frame(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<(), RenderError> {
        self.encoder.send_frame(frame).map_err(|e| {
            FfmpegError::EncodeFrame(format!("AAC encoder send_frame error: {}", e)).into()
        })
    }

    pub fn send_eof(&mut self) -> Result<(), RenderError> {
        self.encoder.send_eof().map_err(|e| {
            FfmpegError::EncodeFrame(format!("AAC encoder send_eof error: {}", e)).into()
        })
    }

    /// Receive one encoded packet, or `None` if the encoder needs more input.
    pub fn receive_packet(&mut self) -> Result<Option<ffmpeg::codec::packet::Packet>, RenderError> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => {
                if packet.pts().is_none() {
                    packet.set_pts(Some(self.pts));
                    packet.set_dts(Some(self.pts));
                }
                self.pts += self.frame_size as i64;
                Ok(Some(packet))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(FfmpegError::EncodeFrame(format!(
                "AAC encoder receive_packet error: {}",
                e
            ))
            .into()),
        }
    }

    /// Samples per channel the encoder expects per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// The output timebase (1 / sample_rate).
    pub fn output_timebase(&self) -> ffmpeg::Rational {
        self.output_timebase
    }

    /// Codec parameters for the muxer stream, copied from the opened encoder.
    pub fn codec_parameters(&self) -> ffmpeg::codec::Parameters {
        crate::ffmpeg_utils::helpers::encoder_codec_parameters(&self.encoder)
    }
}

/// Channel layout used for `channels` output channels.
pub fn channel_layout_for(channels: u16) -> ChannelLayout {
    let layout = crate::render::decoder::default_layout(channels);
    if layout.bits() != 0 {
        layout
    } else {
        ChannelLayout::STEREO
    }
}

/// Check whether the FFmpeg build includes an AAC encoder.
pub fn is_aac_encoder_available() -> bool {
    codec::encoder::find(codec::Id::AAC).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_layout_for() {
        assert_eq!(channel_layout_for(1), ChannelLayout::MONO);
        assert_eq!(channel_layout_for(2), ChannelLayout::STEREO);
        assert_eq!(channel_layout_for(6).bits().count_ones(), 6);
    }

    #[test]
    fn test_aac_encoder_creation() {
        if !is_aac_encoder_available() {
            return;
        }
        let enc = AacEncoder::open(44_100, 2, 128_000);
        assert!(enc.is_ok(), "AAC encoder should open: {:?}", enc.err());
        let enc = enc.unwrap();
        assert_eq!(enc.output_timebase(), ffmpeg::Rational::new(1, 44_100));
        assert_eq!(enc.frame_size(), AAC_FRAME_SIZE);
    }
}
