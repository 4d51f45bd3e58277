//! CodecContext, Packet and Frame classes
//!
//! Thin property-accessor wrappers over the session. Send/receive methods
//! return `0`, the would-block code or the end-of-stream code and throw on
//! anything else.

use napi::bindgen_prelude::*;
use napi_derive::napi;

use crate::codec::{
  CodecContext, CodecParameters, CodecType, Frame, HwDeviceContext, Options, Packet,
};
use crate::engine::registry;
use crate::engine::{
  ChannelLayout, CodecId, HwDeviceType, MediaType, PixelFormat, Rational, SampleFormat,
};

use super::error::{codec_error, data_error, not_supported_error, status_code};

fn parse_pix_fmt(name: &str) -> Result<PixelFormat> {
  PixelFormat::from_name(name).ok_or_else(|| data_error(&format!("unknown pixel format '{}'", name)))
}

fn parse_sample_fmt(name: &str) -> Result<SampleFormat> {
  SampleFormat::from_name(name)
    .ok_or_else(|| data_error(&format!("unknown sample format '{}'", name)))
}

fn parse_codec_type(name: &str) -> Result<CodecType> {
  match name {
    "decoder" => Ok(CodecType::Decoder),
    "encoder" => Ok(CodecType::Encoder),
    other => Err(data_error(&format!(
      "codec type must be 'decoder' or 'encoder', got '{}'",
      other
    ))),
  }
}

/// Rational number as seen from JavaScript
#[napi(object)]
pub struct JsRational {
  pub num: i32,
  pub den: i32,
}

impl From<Rational> for JsRational {
  fn from(r: Rational) -> Self {
    Self {
      num: r.num,
      den: r.den,
    }
  }
}

impl From<JsRational> for Rational {
  fn from(r: JsRational) -> Self {
    Rational::new(r.num, r.den)
  }
}

/// Stream parameters exchanged with containers
#[napi(object)]
pub struct JsCodecParameters {
  pub codec: String,
  pub media_type: String,
  pub bit_rate: Option<i64>,
  pub extradata: Option<Buffer>,
  pub width: Option<u32>,
  pub height: Option<u32>,
  pub pixel_format: Option<String>,
  pub video_delay: Option<u32>,
  pub sample_rate: Option<u32>,
  pub channels: Option<u32>,
  pub sample_format: Option<String>,
  pub frame_size: Option<u32>,
}

impl From<CodecParameters> for JsCodecParameters {
  fn from(p: CodecParameters) -> Self {
    let video = p.media_type == MediaType::Video;
    let audio = p.media_type == MediaType::Audio;
    Self {
      codec: p.codec_id.name().to_string(),
      media_type: p.media_type.name().to_string(),
      bit_rate: Some(p.bit_rate),
      extradata: (!p.extradata.is_empty()).then(|| Buffer::from(p.extradata)),
      width: video.then_some(p.width),
      height: video.then_some(p.height),
      pixel_format: video.then(|| p.pix_fmt.name().to_string()),
      video_delay: video.then_some(p.video_delay),
      sample_rate: audio.then_some(p.sample_rate),
      channels: audio.then_some(p.ch_layout.channels),
      sample_format: audio.then(|| p.sample_fmt.name().to_string()),
      frame_size: audio.then_some(p.frame_size),
    }
  }
}

impl JsCodecParameters {
  fn to_parameters(&self) -> Result<CodecParameters> {
    let codec_id = CodecId::from_name(&self.codec)
      .ok_or_else(|| not_supported_error(&format!("unknown codec '{}'", self.codec)))?;
    let mut params = match codec_id.media_type() {
      MediaType::Audio => CodecParameters::audio(
        codec_id,
        self.sample_rate.unwrap_or(0),
        ChannelLayout::default_for(self.channels.unwrap_or(0)),
        match &self.sample_format {
          Some(name) => parse_sample_fmt(name)?,
          None => SampleFormat::None,
        },
      ),
      _ => CodecParameters::video(
        codec_id,
        self.width.unwrap_or(0),
        self.height.unwrap_or(0),
        match &self.pixel_format {
          Some(name) => parse_pix_fmt(name)?,
          None => PixelFormat::None,
        },
      ),
    };
    if let Some(bit_rate) = self.bit_rate {
      params.bit_rate = bit_rate;
    }
    if let Some(extradata) = &self.extradata {
      params.extradata = extradata.to_vec();
    }
    if let Some(delay) = self.video_delay {
      params.video_delay = delay;
    }
    if let Some(frame_size) = self.frame_size {
      params.frame_size = frame_size;
    }
    Ok(params)
  }
}

// ============================================================================
// Packet
// ============================================================================

/// Encoded data; an empty packet is the flush marker
#[napi(js_name = "Packet")]
pub struct JsPacket {
  pub(crate) inner: Packet,
}

#[napi]
impl JsPacket {
  #[napi(constructor)]
  pub fn new(data: Option<Buffer>) -> Self {
    let inner = match data {
      Some(buf) => Packet::from_vec(buf.to_vec()),
      None => Packet::new(),
    };
    Self { inner }
  }

  #[napi(getter)]
  pub fn data(&self) -> Buffer {
    Buffer::from(self.inner.to_vec())
  }

  #[napi(getter)]
  pub fn size(&self) -> u32 {
    self.inner.size() as u32
  }

  #[napi(getter)]
  pub fn pts(&self) -> i64 {
    self.inner.pts()
  }

  #[napi(setter)]
  pub fn set_pts(&mut self, pts: i64) {
    self.inner.set_pts(pts);
  }

  #[napi(getter)]
  pub fn dts(&self) -> i64 {
    self.inner.dts()
  }

  #[napi(setter)]
  pub fn set_dts(&mut self, dts: i64) {
    self.inner.set_dts(dts);
  }

  #[napi(getter)]
  pub fn duration(&self) -> i64 {
    self.inner.duration()
  }

  #[napi(setter)]
  pub fn set_duration(&mut self, duration: i64) {
    self.inner.set_duration(duration);
  }

  #[napi(getter)]
  pub fn is_keyframe(&self) -> bool {
    self.inner.is_key()
  }

  #[napi(setter)]
  pub fn set_is_keyframe(&mut self, key: bool) {
    self.inner.set_key(key);
  }

  /// Drop the payload, turning this into a flush marker
  #[napi]
  pub fn unref(&mut self) {
    self.inner.unref();
  }
}

// ============================================================================
// Frame
// ============================================================================

/// Decoded picture or block of audio samples
#[napi(js_name = "Frame")]
pub struct JsFrame {
  pub(crate) inner: Frame,
}

#[napi]
impl JsFrame {
  /// Empty frame, used as the destination of `receiveFrame`
  #[napi(constructor)]
  pub fn new() -> Self {
    Self {
      inner: Frame::new(),
    }
  }

  /// Wrap tightly packed video data
  #[napi(factory)]
  pub fn video(width: u32, height: u32, format: String, data: Buffer) -> Result<Self> {
    let inner = Frame::from_video_data(width, height, parse_pix_fmt(&format)?, data.to_vec())
      .map_err(codec_error)?;
    Ok(Self { inner })
  }

  /// Wrap interleaved or planar audio data
  #[napi(factory)]
  pub fn audio(format: String, channels: u32, sample_rate: u32, data: Buffer) -> Result<Self> {
    let inner = Frame::from_audio_data(
      parse_sample_fmt(&format)?,
      ChannelLayout::default_for(channels),
      sample_rate,
      data.to_vec(),
    )
    .map_err(codec_error)?;
    Ok(Self { inner })
  }

  #[napi(getter)]
  pub fn width(&self) -> u32 {
    self.inner.width()
  }

  #[napi(getter)]
  pub fn height(&self) -> u32 {
    self.inner.height()
  }

  #[napi(getter)]
  pub fn format(&self) -> String {
    match self.inner.media_type() {
      MediaType::Audio => self.inner.sample_format().name().to_string(),
      _ => self.inner.format().name().to_string(),
    }
  }

  #[napi(getter)]
  pub fn nb_samples(&self) -> u32 {
    self.inner.nb_samples()
  }

  #[napi(getter)]
  pub fn sample_rate(&self) -> u32 {
    self.inner.sample_rate()
  }

  #[napi(getter)]
  pub fn pts(&self) -> i64 {
    self.inner.pts()
  }

  #[napi(setter)]
  pub fn set_pts(&mut self, pts: i64) {
    self.inner.set_pts(pts);
  }

  #[napi(getter)]
  pub fn duration(&self) -> i64 {
    self.inner.duration()
  }

  #[napi(getter)]
  pub fn is_keyframe(&self) -> bool {
    self.inner.is_key_frame()
  }

  #[napi(getter)]
  pub fn is_hardware(&self) -> bool {
    self.inner.is_hardware()
  }

  #[napi(getter)]
  pub fn data(&self) -> Buffer {
    Buffer::from(self.inner.data().to_vec())
  }

  /// Copy a hardware frame into system memory
  #[napi]
  pub fn transfer_to_software(&self) -> Result<JsFrame> {
    let frames = self
      .inner
      .hw_frames_ctx()
      .ok_or_else(|| data_error("frame is not a hardware frame"))?;
    let inner = frames.download_frame(&self.inner).map_err(codec_error)?;
    Ok(JsFrame { inner })
  }

  #[napi]
  pub fn unref(&mut self) {
    self.inner.unref();
  }

  /// Frame with no content, passed as the encoder flush marker
  fn is_flush_marker(&self) -> bool {
    self.inner.data().is_empty() && !self.inner.is_hardware()
  }
}

impl Default for JsFrame {
  fn default() -> Self {
    Self::new()
  }
}

// ============================================================================
// CodecContext
// ============================================================================

/// One encoder or decoder session
#[napi(js_name = "CodecContext")]
pub struct JsCodecContext {
  inner: CodecContext,
}

macro_rules! config_accessor {
  ($get:ident, $set:ident, $field:ident, $ty:ty) => {
    #[napi]
    impl JsCodecContext {
      #[napi(getter)]
      pub fn $get(&self) -> $ty {
        self.inner.config().$field
      }

      #[napi(setter)]
      pub fn $set(&mut self, value: $ty) -> Result<()> {
        self.inner.config_mut().map_err(codec_error)?.$field = value;
        Ok(())
      }
    }
  };
}

config_accessor!(width, set_width, width, u32);
config_accessor!(height, set_height, height, u32);
config_accessor!(bit_rate, set_bit_rate, bit_rate, i64);
config_accessor!(gop_size, set_gop_size, gop_size, i32);
config_accessor!(max_b_frames, set_max_b_frames, max_b_frames, u32);
config_accessor!(has_b_frames, set_has_b_frames, has_b_frames, u32);
config_accessor!(sample_rate, set_sample_rate, sample_rate, u32);
config_accessor!(frame_size, set_frame_size, frame_size, u32);
config_accessor!(thread_count, set_thread_count, thread_count, u32);

#[napi]
impl JsCodecContext {
  /// `codecType` is "decoder" or "encoder"; `codec` is an optional codec name
  #[napi(constructor)]
  pub fn new(codec_type: String, codec: Option<String>) -> Result<Self> {
    let role = parse_codec_type(&codec_type)?;
    let inner = match codec {
      Some(name) => {
        let descriptor = registry::find_descriptor_by_name(&name, role)
          .ok_or_else(|| not_supported_error(&format!("codec '{}' not found", name)))?;
        CodecContext::new(role, descriptor.media_type, Some(descriptor.id))
      }
      None => CodecContext::new(role, MediaType::Unknown, None),
    }
    .map_err(codec_error)?;
    Ok(Self { inner })
  }

  #[napi(getter)]
  pub fn codec_type(&self) -> String {
    match self.inner.codec_type() {
      CodecType::Decoder => "decoder".into(),
      CodecType::Encoder => "encoder".into(),
    }
  }

  #[napi(getter)]
  pub fn codec(&self) -> String {
    self.inner.codec_id().name().to_string()
  }

  #[napi(getter)]
  pub fn media_type(&self) -> String {
    self.inner.media_type().name().to_string()
  }

  #[napi(getter)]
  pub fn is_open(&self) -> bool {
    self.inner.is_open()
  }

  #[napi(getter)]
  pub fn frame_num(&self) -> i64 {
    self.inner.frame_num() as i64
  }

  #[napi(getter)]
  pub fn delay(&self) -> u32 {
    self.inner.config().delay
  }

  #[napi(getter)]
  pub fn pixel_format(&self) -> String {
    self.inner.pixel_format().name().to_string()
  }

  #[napi(setter)]
  pub fn set_pixel_format(&mut self, value: String) -> Result<()> {
    let fmt = parse_pix_fmt(&value)?;
    self.inner.config_mut().map_err(codec_error)?.pix_fmt = fmt;
    Ok(())
  }

  #[napi(getter)]
  pub fn sw_pixel_format(&self) -> String {
    self.inner.config().sw_pix_fmt.name().to_string()
  }

  #[napi(getter)]
  pub fn sample_format(&self) -> String {
    self.inner.config().sample_fmt.name().to_string()
  }

  #[napi(setter)]
  pub fn set_sample_format(&mut self, value: String) -> Result<()> {
    let fmt = parse_sample_fmt(&value)?;
    self.inner.config_mut().map_err(codec_error)?.sample_fmt = fmt;
    Ok(())
  }

  #[napi(getter)]
  pub fn channels(&self) -> u32 {
    self.inner.config().ch_layout.channels
  }

  #[napi(setter)]
  pub fn set_channels(&mut self, channels: u32) -> Result<()> {
    self.inner.config_mut().map_err(codec_error)?.ch_layout = ChannelLayout::default_for(channels);
    Ok(())
  }

  #[napi(getter)]
  pub fn time_base(&self) -> JsRational {
    self.inner.config().time_base.into()
  }

  #[napi(setter)]
  pub fn set_time_base(&mut self, value: JsRational) -> Result<()> {
    self.inner.config_mut().map_err(codec_error)?.time_base = value.into();
    Ok(())
  }

  #[napi(getter)]
  pub fn framerate(&self) -> JsRational {
    self.inner.config().framerate.into()
  }

  #[napi(setter)]
  pub fn set_framerate(&mut self, value: JsRational) -> Result<()> {
    self.inner.config_mut().map_err(codec_error)?.framerate = value.into();
    Ok(())
  }

  /// Flag words in option syntax, e.g. "+global_header"
  #[napi(getter)]
  pub fn flags(&self) -> String {
    self.inner.config().flags.to_string()
  }

  #[napi(setter)]
  pub fn set_flags(&mut self, value: String) -> Result<()> {
    let config = self.inner.config_mut().map_err(codec_error)?;
    config.flags = config.flags.apply_str(&value).map_err(|e| data_error(&e))?;
    Ok(())
  }

  #[napi(getter)]
  pub fn thread_type(&self) -> String {
    self.inner.config().thread_type.to_string()
  }

  #[napi(setter)]
  pub fn set_thread_type(&mut self, value: String) -> Result<()> {
    let config = self.inner.config_mut().map_err(codec_error)?;
    config.thread_type = config.thread_type.apply_str(&value).map_err(|e| data_error(&e))?;
    Ok(())
  }

  #[napi(getter)]
  pub fn extradata(&self) -> Option<Buffer> {
    self.inner.extradata().map(|data| Buffer::from(data.to_vec()))
  }

  #[napi(setter)]
  pub fn set_extradata(&mut self, value: Option<Buffer>) -> Result<()> {
    self.inner.config_mut().map_err(codec_error)?.extradata =
      value.map(|buf| buf.to_vec()).unwrap_or_default();
    Ok(())
  }

  /// Export the configuration as stream parameters
  #[napi]
  pub fn get_parameters(&self) -> JsCodecParameters {
    self.inner.parameters().into()
  }

  /// Import stream parameters; only before open
  #[napi]
  pub fn set_parameters(&mut self, params: JsCodecParameters) -> Result<()> {
    let params = params.to_parameters()?;
    self
      .inner
      .configure_from_parameters(&params)
      .map_err(codec_error)
  }

  /// Attach a hardware device by type name, e.g. "cuda"
  #[napi]
  pub fn set_hardware_device(&mut self, device_type: String, device: Option<String>) -> Result<()> {
    let kind = HwDeviceType::from_name(&device_type).ok_or_else(|| {
      not_supported_error(&format!("unknown hardware device '{}'", device_type))
    })?;
    let ctx = HwDeviceContext::new(kind, device.as_deref()).map_err(codec_error)?;
    self.inner.set_hw_device_ctx(Some(ctx)).map_err(codec_error)
  }

  /// Prefer a hardware format during negotiation
  ///
  /// The callback installs a frames pool on the attached device and picks
  /// `format` when offered; otherwise it falls back to the software format.
  #[napi]
  pub fn set_hardware_pixel_format(&mut self, format: String) -> Result<()> {
    let preferred = parse_pix_fmt(&format)?;
    if !preferred.is_hardware() {
      return Err(data_error(&format!("{} is not a hardware format", preferred)));
    }
    self
      .inner
      .set_get_format(move |ctx, list| {
        if list.contains(&preferred) && ctx.init_hw_frames_ctx(preferred).is_ok() {
          return preferred;
        }
        list
          .iter()
          .copied()
          .find(|fmt| !fmt.is_hardware())
          .unwrap_or(PixelFormat::None)
      })
      .map_err(codec_error)
  }

  /// Open the codec; returns the names of options nobody recognized
  #[napi]
  pub fn open2(
    &mut self,
    codec: Option<String>,
    options: Option<std::collections::HashMap<String, String>>,
  ) -> Result<Vec<String>> {
    let codec = match codec {
      Some(name) => Some(
        CodecId::from_name(&name)
          .ok_or_else(|| not_supported_error(&format!("unknown codec '{}'", name)))?,
      ),
      None => None,
    };
    let options: Options = options.into_iter().flatten().collect();
    let leftover = self.inner.open(codec, options).map_err(codec_error)?;
    Ok(leftover.keys().map(str::to_string).collect())
  }

  #[napi]
  pub fn close(&mut self) {
    self.inner.close();
  }

  #[napi]
  pub fn flush_buffers(&mut self) -> Result<()> {
    self.inner.flush().map_err(codec_error)
  }

  /// Returns 0, the would-block code or the end-of-stream code
  #[napi]
  pub fn send_packet(&mut self, packet: &JsPacket) -> Result<i32> {
    status_code(self.inner.send_packet(Some(&packet.inner)))
  }

  /// Fills `frame` on success
  #[napi]
  pub fn receive_frame(&mut self, frame: &mut JsFrame) -> Result<i32> {
    status_code(self.inner.receive_frame().map(|out| frame.inner = out))
  }

  /// An empty frame is the flush marker
  #[napi]
  pub fn send_frame(&mut self, frame: &JsFrame) -> Result<i32> {
    let frame = (!frame.is_flush_marker()).then_some(&frame.inner);
    status_code(self.inner.send_frame(frame))
  }

  /// Fills `packet` on success
  #[napi]
  pub fn receive_packet(&mut self, packet: &mut JsPacket) -> Result<i32> {
    status_code(self.inner.receive_packet().map(|out| packet.inner = out))
  }
}
