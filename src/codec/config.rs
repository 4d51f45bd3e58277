//! Configuration snapshot of a codec session

use crate::engine::{ChannelLayout, CodecId, MediaType, PixelFormat, Rational, SampleFormat};

use super::flags::{CodecFlags, CodecFlags2, ThreadMode, ThreadType};

/// Codec configuration
///
/// Everything here is set before opening; an open session exposes the
/// snapshot read-only. Fields the engine fills in on open (`delay`,
/// `active_thread_type`, the negotiated `pix_fmt`) are noted as such.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfig {
  pub codec_id: CodecId,
  pub media_type: MediaType,
  /// Container-level fourcc
  pub codec_tag: u32,
  /// Target bitrate in bits per second
  pub bit_rate: i64,
  pub flags: CodecFlags,
  pub flags2: CodecFlags2,
  /// Codec-specific global header (e.g. SPS/PPS for H.264)
  pub extradata: Vec<u8>,
  /// Unit of frame/packet timestamps; encoders require it
  pub time_base: Rational,
  /// Time base of packets fed to a decoder
  pub pkt_timebase: Rational,
  pub framerate: Rational,
  pub profile: Option<i32>,
  pub level: Option<i32>,

  // Video
  pub width: u32,
  pub height: u32,
  pub coded_width: u32,
  pub coded_height: u32,
  pub sample_aspect_ratio: Rational,
  /// Active pixel format; for decoders this is the negotiated format
  pub pix_fmt: PixelFormat,
  /// Software format behind a hardware `pix_fmt`
  pub sw_pix_fmt: PixelFormat,
  /// Keyframe interval
  pub gop_size: i32,
  /// Maximum B-frames between non-B frames (encoder lookahead)
  pub max_b_frames: u32,
  /// Decoder reorder depth in frames
  pub has_b_frames: u32,

  // Audio
  pub sample_rate: u32,
  pub ch_layout: ChannelLayout,
  pub sample_fmt: SampleFormat,
  /// Samples per channel in an audio frame, 0 if variable
  pub frame_size: u32,

  // Threading
  /// Worker threads, 0 selects one per logical CPU
  pub thread_count: u32,
  /// Threading modes the caller allows
  pub thread_type: ThreadType,
  /// Threading mode in use (set on open)
  pub active_thread_type: ThreadType,

  /// Frames of output delay introduced by the engine (set on open)
  pub delay: u32,
}

impl Default for CodecConfig {
  fn default() -> Self {
    Self {
      codec_id: CodecId::None,
      media_type: MediaType::Unknown,
      codec_tag: 0,
      bit_rate: 0,
      flags: CodecFlags::empty(),
      flags2: CodecFlags2::empty(),
      extradata: Vec::new(),
      time_base: Rational::new(0, 1),
      pkt_timebase: Rational::new(0, 1),
      framerate: Rational::new(0, 1),
      profile: None,
      level: None,
      width: 0,
      height: 0,
      coded_width: 0,
      coded_height: 0,
      sample_aspect_ratio: Rational::new(0, 1),
      pix_fmt: PixelFormat::None,
      sw_pix_fmt: PixelFormat::None,
      gop_size: 12,
      max_b_frames: 0,
      has_b_frames: 0,
      sample_rate: 0,
      ch_layout: ChannelLayout::default(),
      sample_fmt: SampleFormat::None,
      frame_size: 0,
      thread_count: 1,
      thread_type: ThreadType::from(ThreadMode::Frame) | ThreadMode::Slice,
      active_thread_type: ThreadType::empty(),
      delay: 0,
    }
  }
}

impl CodecConfig {
  /// Video configuration with dimensions and pixel format
  pub fn video(width: u32, height: u32, pix_fmt: PixelFormat) -> Self {
    Self {
      media_type: MediaType::Video,
      width,
      height,
      coded_width: width,
      coded_height: height,
      pix_fmt,
      ..Default::default()
    }
  }

  /// Audio configuration with rate, layout and sample format
  pub fn audio(sample_rate: u32, ch_layout: ChannelLayout, sample_fmt: SampleFormat) -> Self {
    Self {
      media_type: MediaType::Audio,
      sample_rate,
      ch_layout,
      sample_fmt,
      time_base: Rational::new(1, sample_rate as i32),
      ..Default::default()
    }
  }

  /// Software format of the bitstream behind the active pixel format
  pub fn software_pix_fmt(&self) -> PixelFormat {
    if self.pix_fmt.is_hardware() {
      self.sw_pix_fmt
    } else {
      self.pix_fmt
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = CodecConfig::default();
    assert_eq!(config.thread_count, 1);
    assert!(config.thread_type.contains(ThreadMode::Frame));
    assert!(config.thread_type.contains(ThreadMode::Slice));
    assert!(config.active_thread_type.is_empty());
    assert_eq!(config.gop_size, 12);
  }

  #[test]
  fn test_software_pix_fmt() {
    let mut config = CodecConfig::video(64, 48, PixelFormat::Nv12);
    assert_eq!(config.software_pix_fmt(), PixelFormat::Nv12);
    config.pix_fmt = PixelFormat::Cuda;
    config.sw_pix_fmt = PixelFormat::Nv12;
    assert_eq!(config.software_pix_fmt(), PixelFormat::Nv12);
  }

  #[test]
  fn test_audio_time_base() {
    let config = CodecConfig::audio(48_000, ChannelLayout::STEREO, SampleFormat::S16);
    assert_eq!(config.time_base, Rational::new(1, 48_000));
  }
}
