//! Codec session
//!
//! A [`CodecContext`] wraps one engine instance and enforces the
//! open/send/receive/drain protocol around it:
//!
//! ```text
//! Unopened --open--> Open --flush marker--> Flushing --EOF--> Ended
//!                     ^                                        |
//!                     +---------------- flush() ---------------+
//! ```
//!
//! `close()` moves any state to the terminal `Closed` mode.

use crate::engine::registry;
use crate::engine::{
  CodecDescriptor, CodecEngine, CodecId, EngineContext, EngineError, EngineResult, MediaType,
  PixelFormat,
};

use super::config::CodecConfig;
use super::negotiate::{GetFormatCallback, GetFormatContext};
use super::options::Options;
use super::parameters::CodecParameters;
use super::setup::{self, OpenPlan};
use super::{CodecError, CodecResult, Frame, HwDeviceContext, HwFrameContext, Packet};

/// Type of codec (encoder or decoder)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
  Encoder,
  Decoder,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
  /// Configurable, not yet opened
  Unopened,
  /// Accepting input
  Open,
  /// Flush marker sent; output is being drained
  Flushing,
  /// Fully drained
  Ended,
  /// Torn down; terminal
  Closed,
}

/// Codec session
pub struct CodecContext {
  role: CodecType,
  mode: SessionMode,
  engine: Option<Box<dyn CodecEngine>>,
  /// Codec chosen at creation, if any
  fixed_codec: Option<CodecId>,
  config: CodecConfig,
  hw_device: Option<HwDeviceContext>,
  hw_frames: Option<HwFrameContext>,
  get_format: Option<GetFormatCallback>,
  frame_num: u64,
}

impl CodecContext {
  // ========================================================================
  // Creation
  // ========================================================================

  /// Create a session
  ///
  /// With `codec` the engine is instantiated right away from the registry.
  pub fn new(role: CodecType, media_type: MediaType, codec: Option<CodecId>) -> CodecResult<Self> {
    let engine = match codec {
      Some(id) => Some(registry::create_engine(id, role)?),
      None => None,
    };
    Self::from_parts(role, media_type, engine)
  }

  /// Create a decoder session for the given codec ID
  pub fn new_decoder(codec_id: CodecId) -> CodecResult<Self> {
    Self::new(CodecType::Decoder, codec_id.media_type(), Some(codec_id))
  }

  /// Create an encoder session for the given codec ID
  pub fn new_encoder(codec_id: CodecId) -> CodecResult<Self> {
    Self::new(CodecType::Encoder, codec_id.media_type(), Some(codec_id))
  }

  /// Create a decoder session by codec name (e.g. "rawvideo")
  pub fn new_decoder_by_name(name: &str) -> CodecResult<Self> {
    let descriptor = registry::find_descriptor_by_name(name, CodecType::Decoder)
      .ok_or_else(|| CodecError::CodecNotFound(name.to_string()))?;
    Self::new_decoder(descriptor.id)
  }

  /// Create an encoder session by codec name (e.g. "pcm_s16le")
  pub fn new_encoder_by_name(name: &str) -> CodecResult<Self> {
    let descriptor = registry::find_descriptor_by_name(name, CodecType::Encoder)
      .ok_or_else(|| CodecError::CodecNotFound(name.to_string()))?;
    Self::new_encoder(descriptor.id)
  }

  /// Create a session around an engine that is not in the registry
  pub fn with_engine(role: CodecType, engine: Box<dyn CodecEngine>) -> CodecResult<Self> {
    let media_type = engine.descriptor().media_type;
    Self::from_parts(role, media_type, Some(engine))
  }

  fn from_parts(
    role: CodecType,
    media_type: MediaType,
    engine: Option<Box<dyn CodecEngine>>,
  ) -> CodecResult<Self> {
    let mut config = CodecConfig {
      media_type,
      ..Default::default()
    };
    let mut fixed_codec = None;

    if let Some(engine) = &engine {
      let descriptor = engine.descriptor();
      if !descriptor.supports(role) {
        return Err(match role {
          CodecType::Encoder => CodecError::EncoderNotFound(descriptor.id),
          CodecType::Decoder => CodecError::DecoderNotFound(descriptor.id),
        });
      }
      if media_type != MediaType::Unknown && media_type != descriptor.media_type {
        return Err(CodecError::InvalidConfig(format!(
          "{} is a {} codec, not {}",
          descriptor.name, descriptor.media_type, media_type
        )));
      }
      config.media_type = descriptor.media_type;
      config.codec_id = descriptor.id;
      fixed_codec = Some(descriptor.id);
    }

    tracing::debug!(target: "codec_session", role = ?role, media = %config.media_type, codec = %config.codec_id, "session created");
    Ok(Self {
      role,
      mode: SessionMode::Unopened,
      engine,
      fixed_codec,
      config,
      hw_device: None,
      hw_frames: None,
      get_format: None,
      frame_num: 0,
    })
  }

  // ========================================================================
  // Configuration
  // ========================================================================

  /// Current configuration snapshot
  pub fn config(&self) -> &CodecConfig {
    &self.config
  }

  /// Mutable configuration; only before opening
  pub fn config_mut(&mut self) -> CodecResult<&mut CodecConfig> {
    self.require_unopened("configuration cannot change after open")?;
    Ok(&mut self.config)
  }

  /// Copy stream parameters into the pending configuration
  pub fn configure_from_parameters(&mut self, params: &CodecParameters) -> CodecResult<()> {
    self.require_unopened("parameters can only be applied before open")?;
    params.apply_to(&mut self.config);
    Ok(())
  }

  /// Export the configuration as stream parameters
  pub fn parameters(&self) -> CodecParameters {
    CodecParameters::from_config(&self.config)
  }

  /// Attach (or detach) a hardware device; only before opening
  ///
  /// The previous reference, if any, is released.
  pub fn set_hw_device_ctx(&mut self, device: Option<HwDeviceContext>) -> CodecResult<()> {
    self.require_unopened("hardware device must be set before open")?;
    self.hw_device = device;
    Ok(())
  }

  pub fn hw_device_ctx(&self) -> Option<&HwDeviceContext> {
    self.hw_device.as_ref()
  }

  /// Attach (or detach) a hardware frames context; only before opening
  ///
  /// Decoders normally install frames from the format callback instead.
  pub fn set_hw_frames_ctx(&mut self, frames: Option<HwFrameContext>) -> CodecResult<()> {
    self.require_unopened("hardware frames must be set before open")?;
    self.hw_frames = frames;
    Ok(())
  }

  pub fn hw_frames_ctx(&self) -> Option<&HwFrameContext> {
    self.hw_frames.as_ref()
  }

  /// Register the pixel format negotiation callback
  pub fn set_get_format<F>(&mut self, callback: F) -> CodecResult<()>
  where
    F: FnMut(&mut GetFormatContext<'_>, &[PixelFormat]) -> PixelFormat + Send + 'static,
  {
    if self.mode == SessionMode::Closed {
      return Err(CodecError::InvalidState("codec is closed".into()));
    }
    self.get_format = Some(Box::new(callback));
    Ok(())
  }

  /// Remove the callback; negotiation falls back to the first software format
  pub fn clear_get_format(&mut self) {
    self.get_format = None;
  }

  // ========================================================================
  // Queries
  // ========================================================================

  #[inline]
  pub fn codec_type(&self) -> CodecType {
    self.role
  }

  #[inline]
  pub fn media_type(&self) -> MediaType {
    self.config.media_type
  }

  #[inline]
  pub fn mode(&self) -> SessionMode {
    self.mode
  }

  /// Whether the codec has been opened and not closed
  pub fn is_open(&self) -> bool {
    matches!(
      self.mode,
      SessionMode::Open | SessionMode::Flushing | SessionMode::Ended
    )
  }

  pub fn codec_id(&self) -> CodecId {
    self.config.codec_id
  }

  /// Descriptor of the engine, once one is attached
  pub fn descriptor(&self) -> Option<&'static CodecDescriptor> {
    self.engine.as_ref().map(|e| e.descriptor())
  }

  /// Frames returned by the decoder or accepted by the encoder since open
  pub fn frame_num(&self) -> u64 {
    self.frame_num
  }

  pub fn width(&self) -> u32 {
    self.config.width
  }

  pub fn height(&self) -> u32 {
    self.config.height
  }

  pub fn pixel_format(&self) -> PixelFormat {
    self.config.pix_fmt
  }

  /// Codec extradata (e.g. SPS/PPS for H.264)
  pub fn extradata(&self) -> Option<&[u8]> {
    if self.config.extradata.is_empty() {
      None
    } else {
      Some(&self.config.extradata)
    }
  }

  // ========================================================================
  // Lifecycle
  // ========================================================================

  /// Open the codec
  ///
  /// `codec` must agree with a codec chosen at creation. Returns the options
  /// nobody recognized; they are also logged. On failure the session stays
  /// unopened with its configuration untouched.
  pub fn open(&mut self, codec: Option<CodecId>, options: Options) -> CodecResult<Options> {
    match self.mode {
      SessionMode::Unopened => {}
      SessionMode::Closed => return Err(CodecError::InvalidState("codec is closed".into())),
      _ => return Err(CodecError::InvalidState("codec is already open".into())),
    }

    let codec_id = self.resolve_codec(codec)?;
    let mut engine = match self.engine.take() {
      Some(engine) => engine,
      None => registry::create_engine(codec_id, self.role)?,
    };

    match self.open_with(engine.as_mut(), codec_id, options) {
      Ok((config, leftover)) => {
        self.config = config;
        self.engine = Some(engine);
        self.mode = SessionMode::Open;
        self.frame_num = 0;
        tracing::debug!(
          target: "codec_session",
          codec = %self.config.codec_id,
          role = ?self.role,
          threads = self.config.thread_count,
          thread_type = %self.config.active_thread_type,
          delay = self.config.delay,
          "codec opened"
        );
        Ok(leftover)
      }
      Err(e) => {
        if self.fixed_codec.is_some() {
          self.engine = Some(engine);
        }
        tracing::debug!(target: "codec_session", error = %e, "open failed");
        Err(e)
      }
    }
  }

  fn resolve_codec(&self, codec: Option<CodecId>) -> CodecResult<CodecId> {
    let configured = Some(self.config.codec_id).filter(|id| *id != CodecId::None);
    match (self.fixed_codec, codec) {
      (Some(fixed), Some(requested)) if fixed != requested => Err(CodecError::InvalidConfig(
        format!("codec {} does not match {} chosen at creation", requested, fixed),
      )),
      (Some(fixed), _) => match configured {
        Some(id) if id != fixed => Err(CodecError::InvalidConfig(format!(
          "parameters describe {}, session was created for {}",
          id, fixed
        ))),
        _ => Ok(fixed),
      },
      (None, Some(requested)) => Ok(requested),
      (None, None) => {
        configured.ok_or_else(|| CodecError::InvalidConfig("no codec specified".into()))
      }
    }
  }

  /// Stage options, apply them to `engine` and open it against a copy of
  /// the configuration
  ///
  /// On failure the engine's private options are back at their defaults.
  fn open_with(
    &mut self,
    engine: &mut dyn CodecEngine,
    codec_id: CodecId,
    options: Options,
  ) -> CodecResult<(CodecConfig, Options)> {
    let descriptor = engine.descriptor();
    let plan = setup::prepare(
      self.role,
      descriptor,
      &self.config,
      codec_id,
      options,
      self.hw_frames.as_ref(),
    )?;
    let OpenPlan {
      mut config,
      private,
      leftover,
    } = plan;

    engine.reset_options();
    let previous_frames = self.hw_frames.clone();
    let result = private
      .iter()
      .try_for_each(|(key, value)| engine.set_option(key, value))
      .and_then(|()| {
        let mut ctx = EngineContext::new(
          &mut config,
          self.hw_device.as_ref(),
          &mut self.hw_frames,
          self.get_format.as_mut(),
        );
        engine.open(&mut ctx)
      });
    if let Err(e) = result {
      engine.reset_options();
      self.hw_frames = previous_frames;
      return Err(if e.is_oom() {
        CodecError::ResourceExhausted(e.message)
      } else {
        CodecError::Engine(e)
      });
    }
    Ok((config, leftover))
  }

  /// Discard buffered state and return to `Open`
  ///
  /// Frames and packets already handed out stay valid.
  pub fn flush(&mut self) -> CodecResult<()> {
    match self.mode {
      SessionMode::Unopened => {
        return Err(CodecError::InvalidState("codec is not open".into()))
      }
      SessionMode::Closed => return Err(CodecError::InvalidState("codec is closed".into())),
      _ => {}
    }
    if let Some(engine) = self.engine.as_mut() {
      engine.flush();
    }
    tracing::debug!(target: "codec_session", from = ?self.mode, "codec flushed");
    self.mode = SessionMode::Open;
    Ok(())
  }

  /// Release the engine and hardware references; idempotent
  pub fn close(&mut self) {
    if self.mode == SessionMode::Closed {
      return;
    }
    if let Some(mut engine) = self.engine.take() {
      engine.close();
    }
    self.hw_frames = None;
    self.hw_device = None;
    self.get_format = None;
    tracing::debug!(target: "codec_session", from = ?self.mode, "codec closed");
    self.mode = SessionMode::Closed;
  }

  // ========================================================================
  // Decoding
  // ========================================================================

  /// Send a packet to the decoder
  ///
  /// `None` (or an empty packet) is the flush marker.
  pub fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<()> {
    self.check_io(CodecType::Decoder, "send_packet")?;
    let packet = packet.filter(|p| !p.is_flush_marker());
    if matches!(self.mode, SessionMode::Flushing | SessionMode::Ended) {
      return Err(CodecError::EndOfStream);
    }
    if let Some(pkt) = packet {
      tracing::trace!(target: "codec_session", size = pkt.size(), pts = pkt.pts(), "send packet");
    }

    self
      .run_engine(|engine, ctx| engine.send_packet(ctx, packet))
      .map_err(CodecError::from_io_status)?;
    if packet.is_none() {
      self.mode = SessionMode::Flushing;
      tracing::debug!(target: "codec_session", "decoder draining");
    }
    Ok(())
  }

  /// Receive a decoded frame
  pub fn receive_frame(&mut self) -> CodecResult<Frame> {
    self.check_io(CodecType::Decoder, "receive_frame")?;
    if self.mode == SessionMode::Ended {
      return Err(CodecError::EndOfStream);
    }
    match self.run_engine(|engine, ctx| engine.receive_frame(ctx)) {
      Ok(frame) => {
        self.frame_num += 1;
        tracing::trace!(target: "codec_session", pts = frame.pts(), "frame out");
        Ok(frame)
      }
      Err(e) => Err(self.receive_error(e)),
    }
  }

  /// Decode a packet and return all available frames
  pub fn decode(&mut self, packet: Option<&Packet>) -> CodecResult<Vec<Frame>> {
    let mut frames = Vec::new();

    match self.send_packet(packet) {
      Ok(()) => {}
      Err(CodecError::WouldBlock) => {
        // Decoder is full, drain first
        self.drain_frames(&mut frames)?;
        self.send_packet(packet)?;
      }
      Err(e) => return Err(e),
    }

    self.drain_frames(&mut frames)?;
    Ok(frames)
  }

  /// Send the flush marker and drain the decoder
  pub fn flush_decoder(&mut self) -> CodecResult<Vec<Frame>> {
    self.decode(None)
  }

  fn drain_frames(&mut self, out: &mut Vec<Frame>) -> CodecResult<()> {
    loop {
      match self.receive_frame() {
        Ok(frame) => out.push(frame),
        Err(e) if e.is_flow_control() => return Ok(()),
        Err(e) => return Err(e),
      }
    }
  }

  // ========================================================================
  // Encoding
  // ========================================================================

  /// Send a frame to the encoder; `None` is the flush marker
  pub fn send_frame(&mut self, frame: Option<&Frame>) -> CodecResult<()> {
    self.check_io(CodecType::Encoder, "send_frame")?;
    if matches!(self.mode, SessionMode::Flushing | SessionMode::Ended) {
      return Err(CodecError::EndOfStream);
    }
    if let Some(f) = frame {
      tracing::trace!(target: "codec_session", pts = f.pts(), "send frame");
    }

    self
      .run_engine(|engine, ctx| engine.send_frame(ctx, frame))
      .map_err(CodecError::from_io_status)?;
    match frame {
      Some(_) => self.frame_num += 1,
      None => {
        self.mode = SessionMode::Flushing;
        tracing::debug!(target: "codec_session", "encoder draining");
      }
    }
    Ok(())
  }

  /// Receive an encoded packet
  pub fn receive_packet(&mut self) -> CodecResult<Packet> {
    self.check_io(CodecType::Encoder, "receive_packet")?;
    if self.mode == SessionMode::Ended {
      return Err(CodecError::EndOfStream);
    }
    match self.run_engine(|engine, ctx| engine.receive_packet(ctx)) {
      Ok(pkt) => {
        tracing::trace!(target: "codec_session", size = pkt.size(), pts = pkt.pts(), "packet out");
        Ok(pkt)
      }
      Err(e) => Err(self.receive_error(e)),
    }
  }

  /// Encode a frame and return all available packets
  pub fn encode(&mut self, frame: Option<&Frame>) -> CodecResult<Vec<Packet>> {
    let mut packets = Vec::new();

    match self.send_frame(frame) {
      Ok(()) => {}
      Err(CodecError::WouldBlock) => {
        // Encoder is full, drain first
        self.drain_packets(&mut packets)?;
        self.send_frame(frame)?;
      }
      Err(e) => return Err(e),
    }

    self.drain_packets(&mut packets)?;
    Ok(packets)
  }

  /// Send the flush marker and drain the encoder
  pub fn flush_encoder(&mut self) -> CodecResult<Vec<Packet>> {
    self.encode(None)
  }

  fn drain_packets(&mut self, out: &mut Vec<Packet>) -> CodecResult<()> {
    loop {
      match self.receive_packet() {
        Ok(pkt) => out.push(pkt),
        Err(e) if e.is_flow_control() => return Ok(()),
        Err(e) => return Err(e),
      }
    }
  }

  // ========================================================================
  // Helpers
  // ========================================================================

  fn require_unopened(&self, what: &str) -> CodecResult<()> {
    match self.mode {
      SessionMode::Unopened => Ok(()),
      SessionMode::Closed => Err(CodecError::InvalidState("codec is closed".into())),
      _ => Err(CodecError::InvalidState(what.to_string())),
    }
  }

  fn check_io(&self, role: CodecType, op: &str) -> CodecResult<()> {
    if self.role != role {
      return Err(CodecError::InvalidState(format!(
        "{} is not available on a {:?}",
        op, self.role
      )));
    }
    match self.mode {
      SessionMode::Unopened => Err(CodecError::InvalidState("codec is not open".into())),
      SessionMode::Closed => Err(CodecError::InvalidState("codec is closed".into())),
      _ => Ok(()),
    }
  }

  fn receive_error(&mut self, err: EngineError) -> CodecError {
    if err.is_eof() && self.mode == SessionMode::Flushing {
      self.mode = SessionMode::Ended;
      tracing::debug!(target: "codec_session", frames = self.frame_num, "drained");
    }
    CodecError::from_io_status(err)
  }

  fn run_engine<T>(
    &mut self,
    f: impl FnOnce(&mut dyn CodecEngine, &mut EngineContext<'_>) -> EngineResult<T>,
  ) -> EngineResult<T> {
    let engine = self
      .engine
      .as_deref_mut()
      .ok_or_else(|| EngineError::invalid("no codec engine"))?;
    let mut ctx = EngineContext::new(
      &mut self.config,
      self.hw_device.as_ref(),
      &mut self.hw_frames,
      self.get_format.as_mut(),
    );
    f(engine, &mut ctx)
  }
}

impl Drop for CodecContext {
  fn drop(&mut self) {
    self.close();
  }
}

impl std::fmt::Debug for CodecContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CodecContext")
      .field("type", &self.role)
      .field("mode", &self.mode)
      .field("codec", &self.config.codec_id)
      .field("width", &self.width())
      .field("height", &self.height())
      .field("pixel_format", &self.pixel_format())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::codec::{ErrorKind, PacketSideData, ThreadMode};
  use crate::engine::{ChannelLayout, HwDeviceType, Rational, SampleFormat};

  fn gray_decoder() -> CodecContext {
    let mut dec = CodecContext::new_decoder(CodecId::RawVideo).unwrap();
    dec
      .configure_from_parameters(&CodecParameters::video(
        CodecId::RawVideo,
        2,
        2,
        PixelFormat::Gray8,
      ))
      .unwrap();
    dec
  }

  fn gray_encoder() -> CodecContext {
    let mut enc = CodecContext::new_encoder(CodecId::RawVideo).unwrap();
    let config = enc.config_mut().unwrap();
    config.width = 2;
    config.height = 2;
    config.pix_fmt = PixelFormat::Gray8;
    config.time_base = Rational::new(1, 25);
    enc
  }

  fn opts(pairs: &[(&str, &str)]) -> Options {
    pairs.iter().copied().collect()
  }

  fn packet(pts: i64, fill: u8) -> Packet {
    let mut pkt = Packet::from_vec(vec![fill; 4]);
    pkt.set_pts(pts);
    pkt.set_dts(pts);
    pkt.set_key(true);
    pkt
  }

  fn gray_frame(pts: i64) -> Frame {
    let mut frame = Frame::from_video_data(2, 2, PixelFormat::Gray8, vec![pts as u8; 4]).unwrap();
    frame.set_pts(pts);
    frame
  }

  #[test]
  fn test_receive_before_send_would_block() {
    let mut dec = gray_decoder();
    dec.open(None, Options::new()).unwrap();
    assert!(dec.receive_frame().unwrap_err().is_would_block());
  }

  #[test]
  fn test_decode_keyframe() {
    let mut dec = gray_decoder();
    dec.open(None, Options::new()).unwrap();
    assert!(dec.is_open());
    dec.send_packet(Some(&packet(7, 9))).unwrap();
    let frame = dec.receive_frame().unwrap();
    assert_eq!((frame.width(), frame.height()), (2, 2));
    assert_eq!(frame.format(), PixelFormat::Gray8);
    assert_eq!(frame.pts(), 7);
    assert_eq!(frame.data(), &[9, 9, 9, 9]);
    assert!(frame.is_key_frame());
    assert_eq!(dec.frame_num(), 1);
  }

  #[test]
  fn test_drain_then_end_of_stream_forever() {
    let mut dec = gray_decoder();
    dec.open(None, opts(&[("has_b_frames", "2")])).unwrap();
    for pts in 0..2 {
      dec.send_packet(Some(&packet(pts, 0))).unwrap();
    }
    assert!(dec.receive_frame().unwrap_err().is_would_block());

    dec.send_packet(None).unwrap();
    assert_eq!(dec.mode(), SessionMode::Flushing);
    assert_eq!(dec.receive_frame().unwrap().pts(), 0);
    assert_eq!(dec.receive_frame().unwrap().pts(), 1);
    for _ in 0..3 {
      assert!(dec.receive_frame().unwrap_err().is_eof());
    }
    assert_eq!(dec.mode(), SessionMode::Ended);
  }

  #[test]
  fn test_second_flush_marker_is_end_of_stream() {
    let mut dec = gray_decoder();
    dec.open(None, Options::new()).unwrap();
    dec.send_packet(None).unwrap();
    assert!(dec.send_packet(None).unwrap_err().is_eof());
    assert!(dec.send_packet(Some(&packet(0, 0))).unwrap_err().is_eof());
    // An empty packet is a flush marker too
    assert!(dec.send_packet(Some(&Packet::new())).unwrap_err().is_eof());
  }

  #[test]
  fn test_open_twice_is_invalid_state() {
    let mut dec = gray_decoder();
    dec.open(None, Options::new()).unwrap();
    let before = dec.config().clone();
    let err = dec.open(None, opts(&[("threads", "4")])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(dec.config(), &before);
    assert!(dec.config_mut().is_err());
  }

  #[test]
  fn test_encoder_flush_without_input() {
    let mut enc = gray_encoder();
    enc.open(None, Options::new()).unwrap();
    enc.send_frame(None).unwrap();
    assert!(enc.receive_packet().unwrap_err().is_eof());
    assert!(enc.send_frame(Some(&gray_frame(0))).unwrap_err().is_eof());
  }

  #[test]
  fn test_encode_round_trip() {
    let mut enc = gray_encoder();
    enc.open(None, Options::new()).unwrap();
    let mut packets = enc.encode(Some(&gray_frame(3))).unwrap();
    packets.extend(enc.flush_encoder().unwrap());
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].pts(), 3);
    assert!(packets[0].is_key());

    let mut dec = gray_decoder();
    dec.open(None, Options::new()).unwrap();
    let frames = dec.decode(Some(&packets[0])).unwrap();
    assert_eq!(frames[0].data(), &[3, 3, 3, 3]);
  }

  #[test]
  fn test_role_mismatch_is_invalid_state() {
    let mut dec = gray_decoder();
    dec.open(None, Options::new()).unwrap();
    assert_eq!(
      dec.send_frame(None).unwrap_err().kind(),
      ErrorKind::InvalidState
    );
    assert_eq!(
      dec.receive_packet().unwrap_err().kind(),
      ErrorKind::InvalidState
    );
  }

  #[test]
  fn test_io_before_open_is_invalid_state() {
    let mut dec = gray_decoder();
    assert_eq!(
      dec.send_packet(Some(&packet(0, 0))).unwrap_err().kind(),
      ErrorKind::InvalidState
    );
    assert_eq!(dec.flush().unwrap_err().kind(), ErrorKind::InvalidState);
  }

  #[test]
  fn test_flush_resets_to_fresh_state() {
    let mut dec = gray_decoder();
    dec.open(None, opts(&[("has_b_frames", "1")])).unwrap();
    dec.send_packet(Some(&packet(0, 1))).unwrap();
    dec.send_packet(None).unwrap();

    dec.flush().unwrap();
    assert_eq!(dec.mode(), SessionMode::Open);
    assert!(dec.receive_frame().unwrap_err().is_would_block());
    dec.send_packet(Some(&packet(10, 2))).unwrap();
    dec.send_packet(Some(&packet(11, 3))).unwrap();
    assert_eq!(dec.receive_frame().unwrap().pts(), 10);
  }

  #[test]
  fn test_flush_keeps_returned_frames_valid() {
    let mut dec = gray_decoder();
    dec.open(None, Options::new()).unwrap();
    let frames = dec.decode(Some(&packet(0, 5))).unwrap();
    dec.flush().unwrap();
    dec.close();
    assert_eq!(frames[0].data(), &[5, 5, 5, 5]);
  }

  #[test]
  fn test_backpressure_and_decode_helper() {
    let mut dec = gray_decoder();
    dec.open(None, opts(&[("queue_depth", "1")])).unwrap();
    dec.send_packet(Some(&packet(0, 0))).unwrap();
    assert!(dec.send_packet(Some(&packet(1, 0))).unwrap_err().is_would_block());

    // decode() drains and retries once
    let frames = dec.decode(Some(&packet(1, 0))).unwrap();
    let pts: Vec<i64> = frames.iter().map(Frame::pts).collect();
    assert_eq!(pts, vec![0, 1]);
  }

  #[test]
  fn test_frame_threading_order_and_delay() {
    let mut dec = gray_decoder();
    dec.open(None, opts(&[("threads", "3")])).unwrap();
    assert!(dec.config().active_thread_type.contains(ThreadMode::Frame));
    assert_eq!(dec.config().delay, 2);

    dec.send_packet(Some(&packet(0, 0))).unwrap();
    assert!(dec.receive_frame().unwrap_err().is_would_block());
    dec.send_packet(Some(&packet(1, 0))).unwrap();
    assert!(dec.receive_frame().unwrap_err().is_would_block());
    dec.send_packet(Some(&packet(2, 0))).unwrap();
    assert_eq!(dec.receive_frame().unwrap().pts(), 0);

    let rest = dec.flush_decoder().unwrap();
    assert!(dec.receive_frame().unwrap_err().is_eof());
    let pts: Vec<i64> = rest.iter().map(Frame::pts).collect();
    assert_eq!(pts, vec![1, 2]);
  }

  #[test]
  fn test_thread_count_auto() {
    let mut dec = gray_decoder();
    dec.open(None, opts(&[("threads", "auto")])).unwrap();
    let config = dec.config();
    assert!(config.thread_count >= 1);
    if config.thread_count > 1 {
      assert!(config.active_thread_type.contains(ThreadMode::Frame));
    } else {
      assert!(config.active_thread_type.is_empty());
    }
  }

  #[test]
  fn test_slice_only_falls_back_to_single_thread() {
    let mut dec = gray_decoder();
    dec
      .open(None, opts(&[("threads", "4"), ("thread_type", "slice")]))
      .unwrap();
    assert!(dec.config().active_thread_type.is_empty());
    assert_eq!(dec.config().thread_count, 1);
  }

  #[test]
  fn test_encoder_lookahead_delay() {
    let mut enc = gray_encoder();
    enc.open(None, opts(&[("bf", "2")])).unwrap();
    assert_eq!(enc.config().delay, 2);
    enc.send_frame(Some(&gray_frame(0))).unwrap();
    enc.send_frame(Some(&gray_frame(1))).unwrap();
    assert!(enc.receive_packet().unwrap_err().is_would_block());
    enc.send_frame(Some(&gray_frame(2))).unwrap();
    assert_eq!(enc.receive_packet().unwrap().pts(), 0);
    let rest: Vec<i64> = enc.flush_encoder().unwrap().iter().map(Packet::pts).collect();
    assert_eq!(rest, vec![1, 2]);
  }

  #[test]
  fn test_unrecognized_options_returned() {
    let mut dec = gray_decoder();
    let leftover = dec
      .open(
        None,
        opts(&[("threads", "1"), ("crf", "23"), ("queue_depth", "4")]),
      )
      .unwrap();
    let keys: Vec<&str> = leftover.keys().collect();
    assert_eq!(keys, vec!["crf"]);
  }

  #[test]
  fn test_invalid_option_value_keeps_session_unopened() {
    let mut dec = gray_decoder();
    let err = dec.open(None, opts(&[("bf", "lots")])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    let err = dec.open(None, opts(&[("queue_depth", "0")])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(dec.mode(), SessionMode::Unopened);
    dec.open(None, Options::new()).unwrap();
  }

  #[test]
  fn test_rejected_open_does_not_keep_private_options() {
    let mut dec = gray_decoder();
    let err = dec
      .open(None, opts(&[("queue_depth", "1"), ("bf", "lots")]))
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    // Engine failure after the private options were applied
    dec.set_get_format(|_ctx, _list| PixelFormat::Rgba).unwrap();
    let err = dec.open(None, opts(&[("queue_depth", "1")])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);

    dec.clear_get_format();
    dec.open(None, Options::new()).unwrap();
    dec.send_packet(Some(&packet(0, 0))).unwrap();
    dec.send_packet(Some(&packet(1, 0))).unwrap();
  }

  #[test]
  fn test_failed_open_leaves_config_untouched() {
    let mut enc = CodecContext::new_encoder(CodecId::RawVideo).unwrap();
    enc.config_mut().unwrap().time_base = Rational::new(1, 30);
    let before = enc.config().clone();
    let err = enc.open(None, opts(&[("g", "5")])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(enc.config(), &before);
    assert_eq!(enc.mode(), SessionMode::Unopened);

    let config = enc.config_mut().unwrap();
    config.width = 2;
    config.height = 2;
    config.pix_fmt = PixelFormat::Gray8;
    enc.open(None, opts(&[("g", "5")])).unwrap();
    assert_eq!(enc.config().gop_size, 5);
  }

  #[test]
  fn test_encoder_parameter_validation() {
    let mut enc = gray_encoder();
    enc.config_mut().unwrap().pix_fmt = PixelFormat::Cuda;
    assert!(matches!(
      enc.open(None, Options::new()),
      Err(CodecError::UnsupportedPixelFormat(PixelFormat::Cuda))
    ));

    let mut audio = CodecContext::new_encoder(CodecId::PcmS16le).unwrap();
    *audio.config_mut().unwrap() = CodecConfig {
      codec_id: CodecId::PcmS16le,
      ..CodecConfig::audio(48_000, ChannelLayout::STEREO, SampleFormat::Flt)
    };
    assert!(matches!(
      audio.open(None, Options::new()),
      Err(CodecError::UnsupportedSampleFormat(SampleFormat::Flt))
    ));
    audio.config_mut().unwrap().sample_fmt = SampleFormat::S16;
    audio.open(None, Options::new()).unwrap();
  }

  #[test]
  fn test_codec_override_must_match() {
    let mut dec = gray_decoder();
    let err = dec.open(Some(CodecId::PcmS16le), Options::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    dec.open(Some(CodecId::RawVideo), Options::new()).unwrap();
  }

  #[test]
  fn test_create_without_hint() {
    let mut dec = CodecContext::new(CodecType::Decoder, MediaType::Audio, None).unwrap();
    assert!(dec.descriptor().is_none());
    let err = dec.open(None, Options::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    // Media type mismatch with the override
    let err = dec.open(Some(CodecId::RawVideo), Options::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let config = dec.config_mut().unwrap();
    config.sample_rate = 8_000;
    config.ch_layout = ChannelLayout::MONO;
    dec.open(Some(CodecId::PcmS16le), Options::new()).unwrap();
    assert_eq!(dec.config().sample_fmt, SampleFormat::S16);
    assert_eq!(dec.descriptor().unwrap().name, "pcm_s16le");
  }

  #[test]
  fn test_unknown_codec() {
    assert!(matches!(
      CodecContext::new_decoder(CodecId::H264),
      Err(CodecError::CodecNotFound(_))
    ));
    assert!(matches!(
      CodecContext::new_encoder_by_name("libx264"),
      Err(CodecError::CodecNotFound(_))
    ));
    assert!(CodecContext::new_decoder_by_name("pcm_f32le").is_ok());
  }

  #[test]
  fn test_close_is_terminal_and_idempotent() {
    let mut dec = gray_decoder();
    dec.open(None, Options::new()).unwrap();
    dec.close();
    dec.close();
    assert_eq!(dec.mode(), SessionMode::Closed);
    assert!(!dec.is_open());
    assert_eq!(
      dec.receive_frame().unwrap_err().kind(),
      ErrorKind::InvalidState
    );
    assert_eq!(
      dec.open(None, Options::new()).unwrap_err().kind(),
      ErrorKind::InvalidState
    );
    assert_eq!(dec.flush().unwrap_err().kind(), ErrorKind::InvalidState);
  }

  #[test]
  fn test_parameters_round_trip() {
    let mut dec = gray_decoder();
    dec.open(None, Options::new()).unwrap();
    let params = dec.parameters();
    assert_eq!(params.codec_id, CodecId::RawVideo);
    assert_eq!((params.width, params.height), (2, 2));
    assert_eq!(
      dec.configure_from_parameters(&params).unwrap_err().kind(),
      ErrorKind::InvalidState
    );
  }

  #[test]
  fn test_negotiation_picks_software() {
    let device = HwDeviceContext::new(HwDeviceType::Cuda, None).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut dec = gray_decoder();
    dec.set_hw_device_ctx(Some(device)).unwrap();
    let record = seen.clone();
    dec
      .set_get_format(move |_ctx, list| {
        if let Ok(mut seen) = record.lock() {
          seen.push(list.to_vec());
        }
        list[1]
      })
      .unwrap();
    dec.open(None, Options::new()).unwrap();

    assert_eq!(
      *seen.lock().unwrap(),
      vec![vec![PixelFormat::Cuda, PixelFormat::Gray8]]
    );
    assert_eq!(dec.pixel_format(), PixelFormat::Gray8);
    assert!(dec.hw_frames_ctx().is_none());
    let frame = dec.decode(Some(&packet(0, 1))).unwrap().remove(0);
    assert!(!frame.is_hardware());
  }

  #[test]
  fn test_negotiation_out_of_list_fails_open() {
    let mut dec = gray_decoder();
    dec.set_get_format(|_ctx, _list| PixelFormat::Rgba).unwrap();
    let err = dec.open(None, Options::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(dec.mode(), SessionMode::Unopened);
    assert_eq!(dec.pixel_format(), PixelFormat::Gray8);

    dec.clear_get_format();
    dec.open(None, Options::new()).unwrap();
  }

  #[test]
  fn test_hardware_decode_path() {
    let device = HwDeviceContext::new(HwDeviceType::Cuda, None).unwrap();
    let mut dec = gray_decoder();
    dec.set_hw_device_ctx(Some(device.clone())).unwrap();
    dec
      .set_get_format(|ctx, list| {
        if let Some(&hw) = list.iter().find(|f| f.is_hardware()) {
          if ctx.init_hw_frames_ctx(hw).is_ok() {
            return hw;
          }
        }
        list[list.len() - 1]
      })
      .unwrap();
    dec.open(None, Options::new()).unwrap();
    assert_eq!(dec.pixel_format(), PixelFormat::Cuda);
    assert_eq!(dec.config().sw_pix_fmt, PixelFormat::Gray8);
    assert!(dec.hw_frames_ctx().is_some());

    let frame = dec.decode(Some(&packet(4, 8))).unwrap().remove(0);
    assert!(frame.is_hardware());
    let frames = frame.hw_frames_ctx().unwrap().clone();
    let sw = frames.download_frame(&frame).unwrap();
    assert_eq!(sw.data(), &[8, 8, 8, 8]);
    assert_eq!(sw.pts(), 4);
    assert_eq!(dec.parameters().pix_fmt, PixelFormat::Gray8);

    drop(frame);
    drop(frames);
    dec.close();
    assert_eq!(device.ref_count(), 1);
  }

  #[test]
  fn test_param_change_renegotiates() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut dec = gray_decoder();
    dec
      .set_get_format(move |_ctx, list| {
        counter.fetch_add(1, Ordering::SeqCst);
        list[0]
      })
      .unwrap();
    dec.open(None, Options::new()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let mut pkt = Packet::from_vec(vec![1; 16]);
    pkt.set_pts(0);
    pkt.add_side_data(PacketSideData::ParamChange { width: 4, height: 4 });
    dec.send_packet(Some(&pkt)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!((dec.width(), dec.height()), (4, 4));

    let frame = dec.receive_frame().unwrap();
    assert_eq!((frame.width(), frame.height()), (4, 4));

    // Same dimensions again: no renegotiation
    dec.send_packet(Some(&pkt)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn test_failed_renegotiation_keeps_old_dimensions() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut dec = gray_decoder();
    dec
      .set_get_format(move |_ctx, list| {
        // Second negotiation picks something outside the list
        if counter.fetch_add(1, Ordering::SeqCst) == 1 {
          PixelFormat::Rgba
        } else {
          list[0]
        }
      })
      .unwrap();
    dec.open(None, Options::new()).unwrap();

    let mut pkt = Packet::from_vec(vec![1; 16]);
    pkt.set_pts(0);
    pkt.add_side_data(PacketSideData::ParamChange { width: 4, height: 4 });
    let err = dec.send_packet(Some(&pkt)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!((dec.width(), dec.height()), (2, 2));
    assert_eq!(dec.config().coded_width, 2);

    // The retry negotiates again and succeeds
    dec.send_packet(Some(&pkt)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!((dec.width(), dec.height()), (4, 4));
    let frame = dec.receive_frame().unwrap();
    assert_eq!((frame.width(), frame.height()), (4, 4));
  }

  #[test]
  fn test_hw_reference_released_on_replace_and_close() {
    let device = HwDeviceContext::new(HwDeviceType::Vaapi, None).unwrap();
    let mut dec = gray_decoder();
    dec.set_hw_device_ctx(Some(device.clone())).unwrap();
    assert_eq!(device.ref_count(), 2);
    dec.set_hw_device_ctx(None).unwrap();
    assert_eq!(device.ref_count(), 1);

    dec.set_hw_device_ctx(Some(device.clone())).unwrap();
    dec.open(None, Options::new()).unwrap();
    assert_eq!(device.ref_count(), 2);
    assert!(dec.set_hw_device_ctx(None).is_err());
    drop(dec);
    assert_eq!(device.ref_count(), 1);
  }

  #[test]
  fn test_audio_session() {
    let mut enc = CodecContext::new_encoder(CodecId::PcmF32le).unwrap();
    *enc.config_mut().unwrap() = CodecConfig {
      codec_id: CodecId::PcmF32le,
      ..CodecConfig::audio(16_000, ChannelLayout::STEREO, SampleFormat::Flt)
    };
    enc.open(None, Options::new()).unwrap();

    let mut frame = Frame::new_audio(160, SampleFormat::Flt, ChannelLayout::STEREO, 16_000).unwrap();
    frame.set_pts(320);
    let packets = enc.encode(Some(&frame)).unwrap();
    assert_eq!(packets[0].size(), 160 * 2 * 4);
    assert_eq!(packets[0].duration(), 160);

    let mut dec = CodecContext::new_decoder(CodecId::PcmF32le).unwrap();
    dec.configure_from_parameters(&enc.parameters()).unwrap();
    dec.open(None, Options::new()).unwrap();
    let frames = dec.decode(Some(&packets[0])).unwrap();
    assert_eq!(frames[0].nb_samples(), 160);
    assert_eq!(frames[0].pts(), 320);
  }
}
