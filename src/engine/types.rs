//! Core media type definitions shared by the engine contract and the session
//!
//! Discriminants follow the numbering used by libavutil/libavcodec so values
//! can round-trip through bindings that speak raw integers.

use std::fmt;
use std::os::raw::c_int;
use std::str::FromStr;

// ============================================================================
// Rational Number
// ============================================================================

/// Rational number for time bases, frame rates and aspect ratios
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rational {
  /// Numerator
  pub num: c_int,
  /// Denominator
  pub den: c_int,
}

impl Rational {
  pub const fn new(num: c_int, den: c_int) -> Self {
    Self { num, den }
  }

  pub fn as_f64(&self) -> f64 {
    if self.den == 0 {
      0.0
    } else {
      self.num as f64 / self.den as f64
    }
  }

  /// Both numerator and denominator are non-zero
  pub fn is_valid(&self) -> bool {
    self.num != 0 && self.den != 0
  }

  /// Swap numerator and denominator
  pub fn invert(&self) -> Self {
    Self::new(self.den, self.num)
  }

  /// Microsecond time base (1/1000000)
  pub const MICROSECONDS: Self = Self {
    num: 1,
    den: 1_000_000,
  };
}

impl fmt::Display for Rational {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.num, self.den)
  }
}

impl FromStr for Rational {
  type Err = String;

  /// Parses `num/den` or `num:den`
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (num, den) = s
      .split_once('/')
      .or_else(|| s.split_once(':'))
      .ok_or_else(|| format!("invalid rational '{s}'"))?;
    let num = num
      .trim()
      .parse()
      .map_err(|_| format!("invalid rational '{s}'"))?;
    let den = den
      .trim()
      .parse()
      .map_err(|_| format!("invalid rational '{s}'"))?;
    Ok(Self::new(num, den))
  }
}

// ============================================================================
// Media Type
// ============================================================================

/// Kind of elementary stream a codec handles
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MediaType {
  #[default]
  Unknown = -1,
  Video = 0,
  Audio = 1,
  Data = 2,
  Subtitle = 3,
  Attachment = 4,
}

impl MediaType {
  pub fn as_raw(&self) -> c_int {
    *self as c_int
  }

  pub fn from_raw(raw: c_int) -> Self {
    match raw {
      0 => Self::Video,
      1 => Self::Audio,
      2 => Self::Data,
      3 => Self::Subtitle,
      4 => Self::Attachment,
      _ => Self::Unknown,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::Unknown => "unknown",
      Self::Video => "video",
      Self::Audio => "audio",
      Self::Data => "data",
      Self::Subtitle => "subtitle",
      Self::Attachment => "attachment",
    }
  }
}

impl fmt::Display for MediaType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ============================================================================
// Codec IDs
// ============================================================================

/// Codec identifiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CodecId {
  #[default]
  None = 0,
  // Video
  H264 = 27,
  RawVideo = 13,
  Vp8 = 139,
  Vp9 = 167,
  Hevc = 173,
  Av1 = 226,
  // Audio
  PcmS16le = 65536,
  PcmF32le = 65557,
  Mp3 = 86017,
  Aac = 86018,
  Flac = 86028,
  Opus = 86076,
}

impl CodecId {
  /// Canonical short name
  pub fn name(&self) -> &'static str {
    match self {
      Self::None => "none",
      Self::H264 => "h264",
      Self::RawVideo => "rawvideo",
      Self::Vp8 => "vp8",
      Self::Vp9 => "vp9",
      Self::Hevc => "hevc",
      Self::Av1 => "av1",
      Self::PcmS16le => "pcm_s16le",
      Self::PcmF32le => "pcm_f32le",
      Self::Mp3 => "mp3",
      Self::Aac => "aac",
      Self::Flac => "flac",
      Self::Opus => "opus",
    }
  }

  /// Look up a codec id by its canonical name
  pub fn from_name(name: &str) -> Option<Self> {
    ALL_CODEC_IDS.iter().copied().find(|id| id.name() == name)
  }

  /// Media type implied by the codec
  pub fn media_type(&self) -> MediaType {
    match self {
      Self::None => MediaType::Unknown,
      Self::H264 | Self::RawVideo | Self::Vp8 | Self::Vp9 | Self::Hevc | Self::Av1 => {
        MediaType::Video
      }
      Self::PcmS16le | Self::PcmF32le | Self::Mp3 | Self::Aac | Self::Flac | Self::Opus => {
        MediaType::Audio
      }
    }
  }

  pub fn as_raw(&self) -> c_int {
    *self as c_int
  }

  pub fn from_raw(raw: c_int) -> Self {
    ALL_CODEC_IDS
      .iter()
      .copied()
      .find(|id| id.as_raw() == raw)
      .unwrap_or(Self::None)
  }
}

const ALL_CODEC_IDS: &[CodecId] = &[
  CodecId::None,
  CodecId::H264,
  CodecId::RawVideo,
  CodecId::Vp8,
  CodecId::Vp9,
  CodecId::Hevc,
  CodecId::Av1,
  CodecId::PcmS16le,
  CodecId::PcmF32le,
  CodecId::Mp3,
  CodecId::Aac,
  CodecId::Flac,
  CodecId::Opus,
];

impl fmt::Display for CodecId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ============================================================================
// Pixel Formats
// ============================================================================

/// Video pixel formats
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
  #[default]
  None = -1,
  // Planar YUV formats
  Yuv420p = 0,
  Yuv422p = 4,
  Yuv444p = 5,
  Yuva420p = 33,
  // Semi-planar formats
  Nv12 = 23,
  Nv21 = 24,
  // Packed formats
  Rgb24 = 2,
  Bgr24 = 3,
  Gray8 = 8,
  Argb = 25,
  Rgba = 26,
  Abgr = 27,
  Bgra = 28,
  // Hardware formats
  Vaapi = 44,
  Dxva2Vld = 51,
  Vdpau = 98,
  Qsv = 114,
  Cuda = 117,
  Videotoolbox = 158,
  D3d11 = 172,
  Drm = 175,
  Opencl = 178,
  Vulkan = 191,
}

const ALL_PIXEL_FORMATS: &[PixelFormat] = &[
  PixelFormat::None,
  PixelFormat::Yuv420p,
  PixelFormat::Yuv422p,
  PixelFormat::Yuv444p,
  PixelFormat::Yuva420p,
  PixelFormat::Nv12,
  PixelFormat::Nv21,
  PixelFormat::Rgb24,
  PixelFormat::Bgr24,
  PixelFormat::Gray8,
  PixelFormat::Argb,
  PixelFormat::Rgba,
  PixelFormat::Abgr,
  PixelFormat::Bgra,
  PixelFormat::Vaapi,
  PixelFormat::Dxva2Vld,
  PixelFormat::Vdpau,
  PixelFormat::Qsv,
  PixelFormat::Cuda,
  PixelFormat::Videotoolbox,
  PixelFormat::D3d11,
  PixelFormat::Drm,
  PixelFormat::Opencl,
  PixelFormat::Vulkan,
];

impl PixelFormat {
  pub fn as_raw(&self) -> c_int {
    *self as c_int
  }

  /// Unknown values map to `None`
  pub fn from_raw(raw: c_int) -> Self {
    ALL_PIXEL_FORMATS
      .iter()
      .copied()
      .find(|f| f.as_raw() == raw)
      .unwrap_or(Self::None)
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::None => "none",
      Self::Yuv420p => "yuv420p",
      Self::Yuv422p => "yuv422p",
      Self::Yuv444p => "yuv444p",
      Self::Yuva420p => "yuva420p",
      Self::Nv12 => "nv12",
      Self::Nv21 => "nv21",
      Self::Rgb24 => "rgb24",
      Self::Bgr24 => "bgr24",
      Self::Gray8 => "gray",
      Self::Argb => "argb",
      Self::Rgba => "rgba",
      Self::Abgr => "abgr",
      Self::Bgra => "bgra",
      Self::Vaapi => "vaapi",
      Self::Dxva2Vld => "dxva2_vld",
      Self::Vdpau => "vdpau",
      Self::Qsv => "qsv",
      Self::Cuda => "cuda",
      Self::Videotoolbox => "videotoolbox_vld",
      Self::D3d11 => "d3d11",
      Self::Drm => "drm_prime",
      Self::Opencl => "opencl",
      Self::Vulkan => "vulkan",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    ALL_PIXEL_FORMATS.iter().copied().find(|f| f.name() == name)
  }

  /// Number of planes for this pixel format
  pub fn num_planes(&self) -> usize {
    match self {
      Self::Yuv420p | Self::Yuv422p | Self::Yuv444p => 3,
      Self::Yuva420p => 4,
      Self::Nv12 | Self::Nv21 => 2,
      Self::Rgb24
      | Self::Bgr24
      | Self::Gray8
      | Self::Rgba
      | Self::Bgra
      | Self::Argb
      | Self::Abgr => 1,
      _ => 0,
    }
  }

  /// Whether this is a hardware (opaque surface) pixel format
  pub fn is_hardware(&self) -> bool {
    matches!(
      self,
      Self::Vaapi
        | Self::Dxva2Vld
        | Self::Vdpau
        | Self::Qsv
        | Self::Cuda
        | Self::Videotoolbox
        | Self::D3d11
        | Self::Drm
        | Self::Opencl
        | Self::Vulkan
    )
  }

  /// Size in bytes of a tightly packed image, `None` for hardware or unset formats
  pub fn image_size(&self, width: u32, height: u32) -> Option<usize> {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    let size = match self {
      Self::Yuv420p | Self::Nv12 | Self::Nv21 => w * h + 2 * cw * ch,
      Self::Yuva420p => 2 * w * h + 2 * cw * ch,
      Self::Yuv422p => w * h + 2 * cw * h,
      Self::Yuv444p => 3 * w * h,
      Self::Rgb24 | Self::Bgr24 => 3 * w * h,
      Self::Gray8 => w * h,
      Self::Rgba | Self::Bgra | Self::Argb | Self::Abgr => 4 * w * h,
      _ => return None,
    };
    Some(size)
  }
}

impl fmt::Display for PixelFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ============================================================================
// Sample Formats
// ============================================================================

/// Audio sample formats
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleFormat {
  #[default]
  None = -1,
  U8 = 0,
  S16 = 1,
  S32 = 2,
  Flt = 3,
  Dbl = 4,
  U8p = 5,
  S16p = 6,
  S32p = 7,
  Fltp = 8,
  Dblp = 9,
}

const ALL_SAMPLE_FORMATS: &[SampleFormat] = &[
  SampleFormat::None,
  SampleFormat::U8,
  SampleFormat::S16,
  SampleFormat::S32,
  SampleFormat::Flt,
  SampleFormat::Dbl,
  SampleFormat::U8p,
  SampleFormat::S16p,
  SampleFormat::S32p,
  SampleFormat::Fltp,
  SampleFormat::Dblp,
];

impl SampleFormat {
  pub fn as_raw(&self) -> c_int {
    *self as c_int
  }

  pub fn from_raw(raw: c_int) -> Self {
    ALL_SAMPLE_FORMATS
      .iter()
      .copied()
      .find(|f| f.as_raw() == raw)
      .unwrap_or(Self::None)
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::None => "none",
      Self::U8 => "u8",
      Self::S16 => "s16",
      Self::S32 => "s32",
      Self::Flt => "flt",
      Self::Dbl => "dbl",
      Self::U8p => "u8p",
      Self::S16p => "s16p",
      Self::S32p => "s32p",
      Self::Fltp => "fltp",
      Self::Dblp => "dblp",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    ALL_SAMPLE_FORMATS.iter().copied().find(|f| f.name() == name)
  }

  /// Bytes per single-channel sample
  pub fn bytes_per_sample(&self) -> usize {
    match self {
      Self::None => 0,
      Self::U8 | Self::U8p => 1,
      Self::S16 | Self::S16p => 2,
      Self::S32 | Self::S32p | Self::Flt | Self::Fltp => 4,
      Self::Dbl | Self::Dblp => 8,
    }
  }

  pub fn is_planar(&self) -> bool {
    matches!(
      self,
      Self::U8p | Self::S16p | Self::S32p | Self::Fltp | Self::Dblp
    )
  }
}

impl fmt::Display for SampleFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel layout in native (mask) order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChannelLayout {
  /// Number of channels
  pub channels: u32,
  /// Speaker mask, 0 when the order is unspecified
  pub mask: u64,
}

impl ChannelLayout {
  pub const MONO: Self = Self {
    channels: 1,
    mask: 0x4,
  };
  pub const STEREO: Self = Self {
    channels: 2,
    mask: 0x3,
  };
  pub const SURROUND_5_1: Self = Self {
    channels: 6,
    mask: 0x60f,
  };

  /// Layout with a channel count but no speaker assignment
  pub fn unspecified(channels: u32) -> Self {
    Self { channels, mask: 0 }
  }

  /// Default layout for a channel count
  pub fn default_for(channels: u32) -> Self {
    match channels {
      1 => Self::MONO,
      2 => Self::STEREO,
      6 => Self::SURROUND_5_1,
      n => Self::unspecified(n),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.channels == 0
  }
}

impl fmt::Display for ChannelLayout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match *self {
      Self::MONO => f.write_str("mono"),
      Self::STEREO => f.write_str("stereo"),
      Self::SURROUND_5_1 => f.write_str("5.1"),
      _ => write!(f, "{} channels", self.channels),
    }
  }
}

// ============================================================================
// Hardware Device Types
// ============================================================================

/// Hardware acceleration device types
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HwDeviceType {
  #[default]
  None = 0,
  Vdpau = 1,
  Cuda = 2,
  Vaapi = 3,
  Dxva2 = 4,
  Qsv = 5,
  Videotoolbox = 6,
  D3d11va = 7,
  Drm = 8,
  Opencl = 9,
  Mediacodec = 10,
  Vulkan = 11,
}

impl HwDeviceType {
  pub fn as_raw(&self) -> c_int {
    *self as c_int
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::None => "none",
      Self::Vdpau => "vdpau",
      Self::Cuda => "cuda",
      Self::Vaapi => "vaapi",
      Self::Dxva2 => "dxva2",
      Self::Qsv => "qsv",
      Self::Videotoolbox => "videotoolbox",
      Self::D3d11va => "d3d11va",
      Self::Drm => "drm",
      Self::Opencl => "opencl",
      Self::Mediacodec => "mediacodec",
      Self::Vulkan => "vulkan",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    [
      Self::Vdpau,
      Self::Cuda,
      Self::Vaapi,
      Self::Dxva2,
      Self::Qsv,
      Self::Videotoolbox,
      Self::D3d11va,
      Self::Drm,
      Self::Opencl,
      Self::Mediacodec,
      Self::Vulkan,
    ]
    .into_iter()
    .find(|t| t.name() == name)
  }

  /// Get the hardware pixel format for this device type
  pub fn pixel_format(&self) -> PixelFormat {
    match self {
      Self::Videotoolbox => PixelFormat::Videotoolbox,
      Self::Cuda => PixelFormat::Cuda,
      Self::Vaapi => PixelFormat::Vaapi,
      Self::Qsv => PixelFormat::Qsv,
      Self::D3d11va => PixelFormat::D3d11,
      Self::Dxva2 => PixelFormat::Dxva2Vld,
      Self::Vdpau => PixelFormat::Vdpau,
      Self::Drm => PixelFormat::Drm,
      Self::Opencl => PixelFormat::Opencl,
      Self::Vulkan => PixelFormat::Vulkan,
      Self::None | Self::Mediacodec => PixelFormat::None,
    }
  }
}

impl fmt::Display for HwDeviceType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ============================================================================
// Picture Type
// ============================================================================

/// Picture/frame type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PictureType {
  #[default]
  None = 0,
  I = 1,
  P = 2,
  B = 3,
}

// ============================================================================
// Constants
// ============================================================================

/// No timestamp value
pub const NOPTS_VALUE: i64 = i64::MIN;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_image_size() {
    assert_eq!(PixelFormat::Yuv420p.image_size(4, 2), Some(8 + 2 * 2));
    assert_eq!(PixelFormat::Yuv420p.image_size(3, 3), Some(9 + 2 * 4));
    assert_eq!(PixelFormat::Rgba.image_size(2, 2), Some(16));
    assert_eq!(PixelFormat::Cuda.image_size(2, 2), None);
  }

  #[test]
  fn test_hw_pixel_format_mapping() {
    assert_eq!(
      HwDeviceType::Videotoolbox.pixel_format(),
      PixelFormat::Videotoolbox
    );
    assert_eq!(HwDeviceType::Cuda.pixel_format(), PixelFormat::Cuda);
    assert!(HwDeviceType::Vaapi.pixel_format().is_hardware());
    assert!(!PixelFormat::Nv12.is_hardware());
  }

  #[test]
  fn test_name_lookups() {
    assert_eq!(CodecId::from_name("rawvideo"), Some(CodecId::RawVideo));
    assert_eq!(CodecId::RawVideo.media_type(), MediaType::Video);
    assert_eq!(PixelFormat::from_name("nv12"), Some(PixelFormat::Nv12));
    assert_eq!(SampleFormat::from_raw(1), SampleFormat::S16);
    assert_eq!("1/25".parse::<Rational>().unwrap(), Rational::new(1, 25));
    assert!("25".parse::<Rational>().is_err());
  }
}
