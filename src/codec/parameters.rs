//! Stream parameters exchanged with demuxers and muxers

use crate::engine::{ChannelLayout, CodecId, MediaType, PixelFormat, Rational, SampleFormat};

use super::config::CodecConfig;

/// Codec parameters of one elementary stream
#[derive(Debug, Clone, PartialEq)]
pub struct CodecParameters {
  pub media_type: MediaType,
  pub codec_id: CodecId,
  pub codec_tag: u32,
  pub extradata: Vec<u8>,
  pub bit_rate: i64,
  pub profile: Option<i32>,
  pub level: Option<i32>,
  // Video
  pub width: u32,
  pub height: u32,
  pub pix_fmt: PixelFormat,
  pub sample_aspect_ratio: Rational,
  pub framerate: Rational,
  /// Number of frames the decoder must buffer before output starts
  pub video_delay: u32,
  // Audio
  pub sample_rate: u32,
  pub ch_layout: ChannelLayout,
  pub sample_fmt: SampleFormat,
  pub frame_size: u32,
}

impl Default for CodecParameters {
  fn default() -> Self {
    Self {
      media_type: MediaType::Unknown,
      codec_id: CodecId::None,
      codec_tag: 0,
      extradata: Vec::new(),
      bit_rate: 0,
      profile: None,
      level: None,
      width: 0,
      height: 0,
      pix_fmt: PixelFormat::None,
      sample_aspect_ratio: Rational::new(0, 1),
      framerate: Rational::new(0, 1),
      video_delay: 0,
      sample_rate: 0,
      ch_layout: ChannelLayout::default(),
      sample_fmt: SampleFormat::None,
      frame_size: 0,
    }
  }
}

impl CodecParameters {
  /// Parameters of a video stream
  pub fn video(codec_id: CodecId, width: u32, height: u32, pix_fmt: PixelFormat) -> Self {
    Self {
      media_type: MediaType::Video,
      codec_id,
      width,
      height,
      pix_fmt,
      ..Default::default()
    }
  }

  /// Parameters of an audio stream
  pub fn audio(
    codec_id: CodecId,
    sample_rate: u32,
    ch_layout: ChannelLayout,
    sample_fmt: SampleFormat,
  ) -> Self {
    Self {
      media_type: MediaType::Audio,
      codec_id,
      sample_rate,
      ch_layout,
      sample_fmt,
      ..Default::default()
    }
  }

  /// Export the stream-level fields of a configuration
  ///
  /// A hardware pixel format is reported as its software format.
  pub fn from_config(config: &CodecConfig) -> Self {
    Self {
      media_type: config.media_type,
      codec_id: config.codec_id,
      codec_tag: config.codec_tag,
      extradata: config.extradata.clone(),
      bit_rate: config.bit_rate,
      profile: config.profile,
      level: config.level,
      width: config.width,
      height: config.height,
      pix_fmt: config.software_pix_fmt(),
      sample_aspect_ratio: config.sample_aspect_ratio,
      framerate: config.framerate,
      video_delay: config.has_b_frames,
      sample_rate: config.sample_rate,
      ch_layout: config.ch_layout,
      sample_fmt: config.sample_fmt,
      frame_size: config.frame_size,
    }
  }

  /// Copy these parameters into a configuration
  ///
  /// Only the fields belonging to the stream's media type are copied, plus
  /// the common ones. Coded dimensions follow the display dimensions.
  pub fn apply_to(&self, config: &mut CodecConfig) {
    config.media_type = self.media_type;
    config.codec_id = self.codec_id;
    config.codec_tag = self.codec_tag;
    config.extradata = self.extradata.clone();
    config.bit_rate = self.bit_rate;
    config.profile = self.profile;
    config.level = self.level;

    match self.media_type {
      MediaType::Video => {
        config.width = self.width;
        config.height = self.height;
        config.coded_width = self.width;
        config.coded_height = self.height;
        config.pix_fmt = self.pix_fmt;
        config.sample_aspect_ratio = self.sample_aspect_ratio;
        config.framerate = self.framerate;
        config.has_b_frames = self.video_delay;
      }
      MediaType::Audio => {
        config.sample_rate = self.sample_rate;
        config.ch_layout = self.ch_layout;
        config.sample_fmt = self.sample_fmt;
        config.frame_size = self.frame_size;
      }
      _ => {}
    }
  }
}
