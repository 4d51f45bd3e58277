//! Raw media unit (decoded output / encoder input)
//!
//! Frame buffers are reference-counted. Cloning a frame creates a new
//! reference to the same buffer; `make_writable` copies only when the buffer
//! is shared.

use std::sync::Arc;

use crate::engine::{ChannelLayout, MediaType, PictureType, PixelFormat, Rational, SampleFormat, NOPTS_VALUE};

use super::hwframes::HwSurface;
use super::{CodecError, CodecResult, HwFrameContext};

/// One uncompressed audio or video unit
#[derive(Clone)]
pub struct Frame {
  // Video
  width: u32,
  height: u32,
  pix_fmt: PixelFormat,
  sample_aspect_ratio: Rational,
  pict_type: PictureType,
  // Audio
  sample_rate: u32,
  ch_layout: ChannelLayout,
  sample_fmt: SampleFormat,
  nb_samples: u32,
  // Timing
  pts: i64,
  pkt_dts: i64,
  duration: i64,
  key_frame: bool,
  data: Option<Arc<[u8]>>,
  surface: Option<Arc<HwSurface>>,
}

impl Default for Frame {
  fn default() -> Self {
    Self::new()
  }
}

/// Allocate a zeroed buffer, reporting failure instead of aborting
pub(crate) fn alloc_zeroed(size: usize, what: &str) -> CodecResult<Vec<u8>> {
  let mut buf = Vec::new();
  buf
    .try_reserve_exact(size)
    .map_err(|_| CodecError::ResourceExhausted(what.to_string()))?;
  buf.resize(size, 0);
  Ok(buf)
}

impl Frame {
  /// Allocate a new empty frame
  pub fn new() -> Self {
    Self {
      width: 0,
      height: 0,
      pix_fmt: PixelFormat::None,
      sample_aspect_ratio: Rational::new(0, 1),
      pict_type: PictureType::None,
      sample_rate: 0,
      ch_layout: ChannelLayout::default(),
      sample_fmt: SampleFormat::None,
      nb_samples: 0,
      pts: NOPTS_VALUE,
      pkt_dts: NOPTS_VALUE,
      duration: 0,
      key_frame: false,
      data: None,
      surface: None,
    }
  }

  /// Allocate a video frame with a zeroed buffer for the given format and dimensions
  pub fn new_video(width: u32, height: u32, format: PixelFormat) -> CodecResult<Self> {
    let size = format.image_size(width, height).ok_or_else(|| {
      CodecError::InvalidConfig(format!("cannot allocate buffer for pixel format {format}"))
    })?;
    let buf = alloc_zeroed(size, "video frame buffer")?;
    Self::from_video_data(width, height, format, buf)
  }

  /// Wrap tightly packed video data
  pub fn from_video_data(
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
  ) -> CodecResult<Self> {
    if let Some(expected) = format.image_size(width, height) {
      if data.len() != expected {
        return Err(CodecError::InvalidConfig(format!(
          "{}x{} {} needs {} bytes, got {}",
          width,
          height,
          format,
          expected,
          data.len()
        )));
      }
    }
    let mut frame = Self::new();
    frame.width = width;
    frame.height = height;
    frame.pix_fmt = format;
    frame.sample_aspect_ratio = Rational::new(1, 1);
    frame.data = Some(Arc::from(data));
    Ok(frame)
  }

  /// Allocate an audio frame with a zeroed (silent) buffer
  pub fn new_audio(
    nb_samples: u32,
    format: SampleFormat,
    ch_layout: ChannelLayout,
    sample_rate: u32,
  ) -> CodecResult<Self> {
    let size = nb_samples as usize * ch_layout.channels as usize * format.bytes_per_sample();
    let buf = alloc_zeroed(size, "audio frame buffer")?;
    Self::from_audio_data(format, ch_layout, sample_rate, buf)
  }

  /// Wrap interleaved (or plane-after-plane) audio data
  pub fn from_audio_data(
    format: SampleFormat,
    ch_layout: ChannelLayout,
    sample_rate: u32,
    data: Vec<u8>,
  ) -> CodecResult<Self> {
    let block = format.bytes_per_sample() * ch_layout.channels as usize;
    if block == 0 || data.len() % block != 0 {
      return Err(CodecError::InvalidConfig(format!(
        "{} bytes is not a whole number of {} {} samples",
        data.len(),
        ch_layout,
        format
      )));
    }
    let mut frame = Self::new();
    frame.sample_fmt = format;
    frame.ch_layout = ch_layout;
    frame.sample_rate = sample_rate;
    frame.nb_samples = (data.len() / block) as u32;
    frame.data = Some(Arc::from(data));
    Ok(frame)
  }

  /// Kind of media carried by this frame
  pub fn media_type(&self) -> MediaType {
    if self.pix_fmt != PixelFormat::None {
      MediaType::Video
    } else if self.sample_fmt != SampleFormat::None {
      MediaType::Audio
    } else {
      MediaType::Unknown
    }
  }

  // ========================================================================
  // Dimensions and Format
  // ========================================================================

  /// Get frame width
  #[inline]
  pub fn width(&self) -> u32 {
    self.width
  }

  /// Get frame height
  #[inline]
  pub fn height(&self) -> u32 {
    self.height
  }

  /// Set frame dimensions
  pub fn set_dimensions(&mut self, width: u32, height: u32) {
    self.width = width;
    self.height = height;
  }

  /// Get pixel format
  #[inline]
  pub fn format(&self) -> PixelFormat {
    self.pix_fmt
  }

  /// Set pixel format
  pub fn set_format(&mut self, format: PixelFormat) {
    self.pix_fmt = format;
  }

  pub fn sample_aspect_ratio(&self) -> Rational {
    self.sample_aspect_ratio
  }

  pub fn set_sample_aspect_ratio(&mut self, sar: Rational) {
    self.sample_aspect_ratio = sar;
  }

  pub fn sample_rate(&self) -> u32 {
    self.sample_rate
  }

  pub fn ch_layout(&self) -> ChannelLayout {
    self.ch_layout
  }

  pub fn sample_format(&self) -> SampleFormat {
    self.sample_fmt
  }

  pub fn nb_samples(&self) -> u32 {
    self.nb_samples
  }

  // ========================================================================
  // Timestamps
  // ========================================================================

  /// Get presentation timestamp (in time_base units)
  #[inline]
  pub fn pts(&self) -> i64 {
    self.pts
  }

  /// Set presentation timestamp
  #[inline]
  pub fn set_pts(&mut self, pts: i64) {
    self.pts = pts;
  }

  /// DTS of the packet that produced this frame
  #[inline]
  pub fn pkt_dts(&self) -> i64 {
    self.pkt_dts
  }

  #[inline]
  pub fn set_pkt_dts(&mut self, dts: i64) {
    self.pkt_dts = dts;
  }

  /// Get duration (in time_base units)
  #[inline]
  pub fn duration(&self) -> i64 {
    self.duration
  }

  /// Set duration
  #[inline]
  pub fn set_duration(&mut self, duration: i64) {
    self.duration = duration;
  }

  // ========================================================================
  // Frame Type
  // ========================================================================

  /// Check if this is a key frame
  #[inline]
  pub fn is_key_frame(&self) -> bool {
    self.key_frame
  }

  pub fn set_key_frame(&mut self, key: bool) {
    self.key_frame = key;
    if key {
      self.pict_type = PictureType::I;
    }
  }

  /// Get picture type (I, P, B, etc.)
  pub fn pict_type(&self) -> PictureType {
    self.pict_type
  }

  pub fn set_pict_type(&mut self, pict_type: PictureType) {
    self.pict_type = pict_type;
  }

  // ========================================================================
  // Data Access
  // ========================================================================

  /// Frame payload, empty for frames without a buffer
  pub fn data(&self) -> &[u8] {
    self.data.as_deref().unwrap_or(&[])
  }

  /// Number of holders of the frame buffer (0 without buffer)
  pub fn ref_count(&self) -> usize {
    self.data.as_ref().map(Arc::strong_count).unwrap_or(0)
  }

  /// Whether the buffer can be modified without affecting other references
  pub fn is_writable(&self) -> bool {
    self.ref_count() <= 1
  }

  /// Copy the buffer if it is shared so it can be modified in place
  pub fn make_writable(&mut self) {
    if let Some(data) = &self.data {
      if Arc::strong_count(data) > 1 {
        self.data = Some(Arc::from(data.to_vec()));
      }
    }
  }

  /// Mutable access to the payload, copying it first when shared
  pub fn data_mut(&mut self) -> Option<&mut [u8]> {
    self.make_writable();
    self.data.as_mut().and_then(Arc::get_mut)
  }

  pub(crate) fn set_data(&mut self, data: Vec<u8>) {
    self.data = if data.is_empty() {
      None
    } else {
      Some(Arc::from(data))
    };
  }

  pub(crate) fn share_data(&mut self, other: &Frame) {
    self.data = other.data.clone();
  }

  // ========================================================================
  // Hardware
  // ========================================================================

  /// Frames context a hardware frame belongs to
  pub fn hw_frames_ctx(&self) -> Option<&HwFrameContext> {
    self.surface.as_deref().map(HwSurface::frames_ctx)
  }

  pub(crate) fn set_surface(&mut self, surface: Arc<HwSurface>) {
    self.surface = Some(surface);
  }

  /// Whether the frame lives in a hardware surface
  pub fn is_hardware(&self) -> bool {
    self.pix_fmt.is_hardware()
  }

  /// Copy metadata (not the buffer) from another frame
  pub fn copy_props(&mut self, src: &Frame) {
    self.pts = src.pts;
    self.pkt_dts = src.pkt_dts;
    self.duration = src.duration;
    self.key_frame = src.key_frame;
    self.pict_type = src.pict_type;
    self.sample_aspect_ratio = src.sample_aspect_ratio;
  }

  /// Drop the buffer reference and reset fields to defaults
  pub fn unref(&mut self) {
    *self = Self::new();
  }
}

impl std::fmt::Debug for Frame {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut s = f.debug_struct("Frame");
    match self.media_type() {
      MediaType::Audio => s
        .field("sample_fmt", &self.sample_fmt)
        .field("sample_rate", &self.sample_rate)
        .field("nb_samples", &self.nb_samples),
      _ => s
        .field("width", &self.width)
        .field("height", &self.height)
        .field("format", &self.pix_fmt),
    };
    s.field("pts", &self.pts).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_frame_allocation() {
    let frame = Frame::new_video(4, 4, PixelFormat::Yuv420p).unwrap();
    assert_eq!(frame.width(), 4);
    assert_eq!(frame.height(), 4);
    assert_eq!(frame.data().len(), 24);
    assert_eq!(frame.media_type(), MediaType::Video);
  }

  #[test]
  fn test_from_video_data_checks_size() {
    assert!(Frame::from_video_data(2, 2, PixelFormat::Rgba, vec![0; 15]).is_err());
    assert!(Frame::from_video_data(2, 2, PixelFormat::Rgba, vec![0; 16]).is_ok());
  }

  #[test]
  fn test_audio_frame() {
    let frame = Frame::new_audio(480, SampleFormat::S16, ChannelLayout::STEREO, 48_000).unwrap();
    assert_eq!(frame.nb_samples(), 480);
    assert_eq!(frame.data().len(), 480 * 2 * 2);
    assert_eq!(frame.media_type(), MediaType::Audio);
    assert!(Frame::from_audio_data(SampleFormat::S16, ChannelLayout::STEREO, 48_000, vec![0; 3]).is_err());
  }

  #[test]
  fn test_make_writable_copies_shared_buffer() {
    let mut frame = Frame::new_video(2, 2, PixelFormat::Gray8).unwrap();
    let held = frame.clone();
    assert_eq!(frame.ref_count(), 2);
    assert!(!frame.is_writable());

    frame.data_mut().unwrap()[0] = 7;
    assert_eq!(frame.data()[0], 7);
    assert_eq!(held.data()[0], 0);
    assert!(frame.is_writable());
  }
}
