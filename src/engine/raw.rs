//! Reference engine for uncompressed codecs
//!
//! `rawvideo`, `pcm_s16le` and `pcm_f32le` carry samples unchanged, which
//! keeps the bitstream side trivial while still exercising every part of the
//! send/receive contract:
//!
//! * backpressure once `queue_depth` outputs are waiting,
//! * decoder reordering by pts with depth `has_b_frames` (or `reorder`),
//! * encoder lookahead of `max_b_frames` frames,
//! * frame threading with `thread_count - 1` frames of delay,
//! * hardware output through the negotiated frames context.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::codec::options::parse_int;
use crate::codec::{
  CodecError, CodecType, Frame, HwFrameContext, OptionDescriptor, OptionKind, Packet, ThreadMode,
};

use super::threading::FrameThreadPool;
use super::{
  Capabilities, ChannelLayout, CodecDescriptor, CodecEngine, CodecId, EngineContext, EngineError,
  EngineResult, MediaType, PixelFormat, Rational, SampleFormat, ERROR_BUG, ERROR_EXTERNAL,
  NOPTS_VALUE,
};

/// Private options shared by the reference codecs
pub static REFERENCE_OPTIONS: &[OptionDescriptor] = &[
  OptionDescriptor {
    name: "queue_depth",
    help: "outputs held before input is refused with EAGAIN",
    kind: OptionKind::Int { min: 1, max: 1024 },
    default: "8",
  },
  OptionDescriptor {
    name: "reorder",
    help: "decoder reorder depth in frames, -1 follows has_b_frames",
    kind: OptionKind::Int { min: -1, max: 16 },
    default: "-1",
  },
];

pub static RAWVIDEO: CodecDescriptor = CodecDescriptor {
  id: CodecId::RawVideo,
  name: "rawvideo",
  long_name: "raw video",
  media_type: MediaType::Video,
  capabilities: Capabilities {
    decoder: true,
    encoder: true,
    delay: true,
    frame_threads: true,
    slice_threads: false,
    hardware: true,
  },
  pix_fmts: &[
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
  ],
  sample_fmts: &[],
  options: REFERENCE_OPTIONS,
};

pub static PCM_S16LE: CodecDescriptor = CodecDescriptor {
  id: CodecId::PcmS16le,
  name: "pcm_s16le",
  long_name: "PCM signed 16-bit little-endian",
  media_type: MediaType::Audio,
  capabilities: Capabilities {
    decoder: true,
    encoder: true,
    delay: false,
    frame_threads: false,
    slice_threads: false,
    hardware: false,
  },
  pix_fmts: &[],
  sample_fmts: &[SampleFormat::S16],
  options: REFERENCE_OPTIONS,
};

pub static PCM_F32LE: CodecDescriptor = CodecDescriptor {
  id: CodecId::PcmF32le,
  name: "pcm_f32le",
  long_name: "PCM 32-bit floating point little-endian",
  media_type: MediaType::Audio,
  capabilities: Capabilities {
    decoder: true,
    encoder: true,
    delay: false,
    frame_threads: false,
    slice_threads: false,
    hardware: false,
  },
  pix_fmts: &[],
  sample_fmts: &[SampleFormat::Flt],
  options: REFERENCE_OPTIONS,
};

/// Built-in codecs in registration order
pub static DESCRIPTORS: &[&CodecDescriptor] = &[&RAWVIDEO, &PCM_S16LE, &PCM_F32LE];

/// Tunables of the reference engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceOptions {
  pub queue_depth: usize,
  /// Overrides `has_b_frames` for decoders
  pub reorder: Option<usize>,
}

impl Default for ReferenceOptions {
  fn default() -> Self {
    Self {
      queue_depth: 8,
      reorder: None,
    }
  }
}

/// Stream shape captured at open and on parameter changes
#[derive(Debug, Clone)]
struct StreamLayout {
  media_type: MediaType,
  width: u32,
  height: u32,
  sw_format: PixelFormat,
  sample_aspect_ratio: Rational,
  hw_frames: Option<HwFrameContext>,
  sample_fmt: SampleFormat,
  ch_layout: ChannelLayout,
  sample_rate: u32,
}

impl StreamLayout {
  fn capture(ctx: &EngineContext<'_>) -> Self {
    let config = ctx.config();
    Self {
      media_type: config.media_type,
      width: config.width,
      height: config.height,
      sw_format: config.software_pix_fmt(),
      sample_aspect_ratio: config.sample_aspect_ratio,
      hw_frames: ctx
        .hw_frames()
        .filter(|f| config.pix_fmt.is_hardware() && f.hw_format() == config.pix_fmt)
        .cloned(),
      sample_fmt: config.sample_fmt,
      ch_layout: config.ch_layout,
      sample_rate: config.sample_rate,
    }
  }
}

enum Job {
  Decode(Packet),
  Encode(Frame),
}

enum Output {
  Frame(Frame),
  Packet(Packet),
}

impl Output {
  fn pts(&self) -> i64 {
    match self {
      Output::Frame(f) => f.pts(),
      Output::Packet(p) => p.pts(),
    }
  }
}

fn codec_to_engine(err: CodecError) -> EngineError {
  match err {
    CodecError::ResourceExhausted(msg) => EngineError::oom(msg),
    CodecError::Engine(e) => e,
    other => EngineError::new(ERROR_EXTERNAL, other.to_string()),
  }
}

fn process(layout: &StreamLayout, job: Job) -> EngineResult<Output> {
  match (layout.media_type, job) {
    (MediaType::Video, Job::Decode(pkt)) => decode_video(layout, &pkt).map(Output::Frame),
    (MediaType::Audio, Job::Decode(pkt)) => decode_audio(layout, &pkt).map(Output::Frame),
    (MediaType::Video, Job::Encode(frame)) => encode_video(layout, &frame).map(Output::Packet),
    (MediaType::Audio, Job::Encode(frame)) => encode_audio(layout, &frame).map(Output::Packet),
    (media, _) => Err(EngineError::invalid_data(format!(
      "no reference codec for {} streams",
      media
    ))),
  }
}

fn packet_pts(pkt: &Packet) -> i64 {
  if pkt.pts() != NOPTS_VALUE {
    pkt.pts()
  } else {
    pkt.dts()
  }
}

fn decode_video(layout: &StreamLayout, pkt: &Packet) -> EngineResult<Frame> {
  let expected = layout
    .sw_format
    .image_size(layout.width, layout.height)
    .unwrap_or(0);
  if pkt.size() != expected {
    return Err(EngineError::invalid_data(format!(
      "packet of {} bytes does not hold a {}x{} {} picture ({} bytes)",
      pkt.size(),
      layout.width,
      layout.height,
      layout.sw_format,
      expected
    )));
  }

  let mut frame = match &layout.hw_frames {
    Some(hw) => {
      let mut frame = hw.allocate_frame().map_err(codec_to_engine)?;
      frame.set_data(pkt.to_vec());
      frame
    }
    None => Frame::from_video_data(layout.width, layout.height, layout.sw_format, pkt.to_vec())
      .map_err(codec_to_engine)?,
  };
  frame.set_pts(packet_pts(pkt));
  frame.set_pkt_dts(pkt.dts());
  frame.set_duration(pkt.duration());
  frame.set_key_frame(true);
  if layout.sample_aspect_ratio.is_valid() {
    frame.set_sample_aspect_ratio(layout.sample_aspect_ratio);
  }
  Ok(frame)
}

fn decode_audio(layout: &StreamLayout, pkt: &Packet) -> EngineResult<Frame> {
  let mut frame = Frame::from_audio_data(
    layout.sample_fmt,
    layout.ch_layout,
    layout.sample_rate,
    pkt.to_vec(),
  )
  .map_err(|e| EngineError::invalid_data(e.to_string()))?;
  frame.set_pts(packet_pts(pkt));
  frame.set_pkt_dts(pkt.dts());
  let duration = if pkt.duration() > 0 {
    pkt.duration()
  } else {
    frame.nb_samples() as i64
  };
  frame.set_duration(duration);
  frame.set_key_frame(true);
  Ok(frame)
}

fn encode_video(layout: &StreamLayout, frame: &Frame) -> EngineResult<Packet> {
  let downloaded;
  let frame = match frame.hw_frames_ctx() {
    Some(hw) if frame.is_hardware() => {
      downloaded = hw.download_frame(frame).map_err(codec_to_engine)?;
      &downloaded
    }
    _ => frame,
  };

  if frame.format() != layout.sw_format
    || frame.width() != layout.width
    || frame.height() != layout.height
  {
    return Err(EngineError::invalid_data(format!(
      "got a {}x{} {} frame, encoder is configured for {}x{} {}",
      frame.width(),
      frame.height(),
      frame.format(),
      layout.width,
      layout.height,
      layout.sw_format
    )));
  }
  if frame.data().is_empty() {
    return Err(EngineError::invalid_data("frame has no picture data"));
  }

  let mut pkt = Packet::from_vec(frame.data().to_vec());
  pkt.set_pts(frame.pts());
  pkt.set_dts(frame.pts());
  pkt.set_duration(frame.duration());
  pkt.set_key(true);
  Ok(pkt)
}

fn encode_audio(layout: &StreamLayout, frame: &Frame) -> EngineResult<Packet> {
  if frame.sample_format() != layout.sample_fmt
    || frame.ch_layout().channels != layout.ch_layout.channels
  {
    return Err(EngineError::invalid_data(format!(
      "got {} {} samples, encoder is configured for {} {}",
      frame.ch_layout(),
      frame.sample_format(),
      layout.ch_layout,
      layout.sample_fmt
    )));
  }
  if frame.nb_samples() == 0 {
    return Err(EngineError::invalid_data("frame has no samples"));
  }

  let mut pkt = Packet::from_vec(frame.data().to_vec());
  pkt.set_pts(frame.pts());
  pkt.set_dts(frame.pts());
  let duration = if frame.duration() > 0 {
    frame.duration()
  } else {
    frame.nb_samples() as i64
  };
  pkt.set_duration(duration);
  pkt.set_key(true);
  Ok(pkt)
}

type Pool = FrameThreadPool<(Arc<StreamLayout>, Job), Output>;

/// One reference codec instance
pub struct RawCodec {
  descriptor: &'static CodecDescriptor,
  role: CodecType,
  options: ReferenceOptions,
  layout: Option<Arc<StreamLayout>>,
  pool: Option<Pool>,
  /// Outputs held back for reordering or lookahead, keyed by (pts, sequence)
  pending: BTreeMap<(i64, u64), Output>,
  reorder_depth: usize,
  ready: VecDeque<Output>,
  seq: u64,
  draining: bool,
}

impl RawCodec {
  pub fn new(descriptor: &'static CodecDescriptor, role: CodecType) -> Self {
    Self {
      descriptor,
      role,
      options: ReferenceOptions::default(),
      layout: None,
      pool: None,
      pending: BTreeMap::new(),
      reorder_depth: 0,
      ready: VecDeque::new(),
      seq: 0,
      draining: false,
    }
  }

  /// Registry factory
  pub fn create(
    descriptor: &'static CodecDescriptor,
    role: CodecType,
  ) -> EngineResult<Box<dyn CodecEngine>> {
    if !descriptor.supports(role) {
      return Err(EngineError::invalid(format!(
        "{} cannot be used as {:?}",
        descriptor.name, role
      )));
    }
    Ok(Box::new(Self::new(descriptor, role)))
  }

  pub fn options(&self) -> ReferenceOptions {
    self.options
  }

  fn thread_delay(&self) -> usize {
    self
      .pool
      .as_ref()
      .map(|p| p.thread_count().saturating_sub(1))
      .unwrap_or(0)
  }

  fn backlog(&self) -> usize {
    self.ready.len() + self.pending.len() + self.pool.as_ref().map(Pool::in_flight).unwrap_or(0)
  }

  fn capacity(&self) -> usize {
    self.options.queue_depth + self.reorder_depth + self.thread_delay()
  }

  fn push_output(&mut self, out: Output) {
    let order = match self.role {
      CodecType::Decoder => out.pts(),
      CodecType::Encoder => 0,
    };
    self.pending.insert((order, self.seq), out);
    self.seq += 1;
    if self.pending.len() > self.reorder_depth {
      if let Some((_, first)) = self.pending.pop_first() {
        self.ready.push_back(first);
      }
    }
  }

  fn submit(&mut self, job: Option<Job>) -> EngineResult<()> {
    let layout = self
      .layout
      .clone()
      .ok_or_else(|| EngineError::invalid("codec is not open"))?;
    if self.draining {
      return Err(EngineError::eof());
    }
    let Some(job) = job else {
      tracing::trace!(target: "codec_session", codec = self.descriptor.name, "draining");
      self.draining = true;
      return Ok(());
    };
    if self.backlog() >= self.capacity() {
      return Err(EngineError::again());
    }

    match self.pool.as_mut() {
      Some(pool) => pool.submit((layout, job)),
      None => {
        let out = process(&layout, job)?;
        self.push_output(out);
        Ok(())
      }
    }
  }

  fn next_output(&mut self) -> EngineResult<Output> {
    if self.layout.is_none() {
      return Err(EngineError::invalid("codec is not open"));
    }
    loop {
      if let Some(out) = self.ready.pop_front() {
        return Ok(out);
      }

      let waited = match self.pool.as_mut() {
        Some(pool)
          if pool.in_flight() >= pool.thread_count()
            || (self.draining && pool.in_flight() > 0) =>
        {
          pool.wait_next()
        }
        _ => None,
      };
      if let Some(result) = waited {
        let out = result?;
        self.push_output(out);
        continue;
      }

      if self.draining {
        return match self.pending.pop_first() {
          Some((_, out)) => Ok(out),
          None => Err(EngineError::eof()),
        };
      }
      return Err(EngineError::again());
    }
  }

  fn apply_param_change(&mut self, ctx: &mut EngineContext<'_>, width: u32, height: u32) -> EngineResult<()> {
    let config = ctx.config_mut();
    if config.width == width && config.height == height {
      return Ok(());
    }
    let previous = (config.width, config.height, config.coded_width, config.coded_height);
    config.width = width;
    config.height = height;
    config.coded_width = width;
    config.coded_height = height;

    let candidates = ctx.format_candidates();
    if let Err(e) = ctx.get_format(&candidates) {
      // Keep the old shape so the next change renegotiates
      let config = ctx.config_mut();
      (config.width, config.height, config.coded_width, config.coded_height) = previous;
      return Err(e);
    }
    self.layout = Some(Arc::new(StreamLayout::capture(ctx)));
    tracing::debug!(target: "codec_session", width, height, "stream parameters changed");
    Ok(())
  }
}

impl CodecEngine for RawCodec {
  fn descriptor(&self) -> &'static CodecDescriptor {
    self.descriptor
  }

  fn reset_options(&mut self) {
    self.options = ReferenceOptions::default();
  }

  fn set_option(&mut self, name: &str, value: &str) -> EngineResult<()> {
    match name {
      "queue_depth" => {
        self.options.queue_depth = parse_int(value, 1, 1024).map_err(EngineError::invalid)? as usize;
      }
      "reorder" => {
        let depth = parse_int(value, -1, 16).map_err(EngineError::invalid)?;
        self.options.reorder = usize::try_from(depth).ok();
      }
      _ => {
        return Err(EngineError::new(
          super::ERROR_OPTION_NOT_FOUND,
          format!("no private option '{}'", name),
        ))
      }
    }
    Ok(())
  }

  fn open(&mut self, ctx: &mut EngineContext<'_>) -> EngineResult<()> {
    let config = ctx.config();
    match self.descriptor.media_type {
      MediaType::Video => {
        let sw = config.software_pix_fmt();
        if config.width == 0 || config.height == 0 {
          return Err(EngineError::invalid(format!(
            "invalid dimensions {}x{}",
            config.width, config.height
          )));
        }
        if sw.image_size(config.width, config.height).is_none() {
          return Err(EngineError::invalid(format!("unsupported pixel format {}", sw)));
        }
      }
      MediaType::Audio => {
        if config.sample_rate == 0 || config.ch_layout.is_empty() {
          return Err(EngineError::invalid("sample rate and channel layout are required"));
        }
        let native = self.descriptor.sample_fmts.first().copied().unwrap_or(SampleFormat::None);
        if config.sample_fmt != SampleFormat::None && config.sample_fmt != native {
          return Err(EngineError::invalid(format!(
            "{} carries {} samples, not {}",
            self.descriptor.name, native, config.sample_fmt
          )));
        }
        ctx.config_mut().sample_fmt = native;
      }
      other => {
        return Err(EngineError::invalid(format!("unsupported media type {}", other)));
      }
    }

    if self.role == CodecType::Decoder && self.descriptor.media_type == MediaType::Video {
      let candidates = ctx.format_candidates();
      ctx.get_format(&candidates)?;
    }

    let config = ctx.config();
    self.reorder_depth = match self.role {
      CodecType::Decoder => self
        .options
        .reorder
        .unwrap_or(config.has_b_frames as usize),
      CodecType::Encoder if self.descriptor.capabilities.delay => config.max_b_frames as usize,
      CodecType::Encoder => 0,
    };

    let threads = if config.active_thread_type.contains(ThreadMode::Frame) {
      config.thread_count as usize
    } else {
      1
    };
    self.pool = if threads > 1 {
      Some(FrameThreadPool::new(
        threads,
        self.descriptor.name,
        |(layout, job): (Arc<StreamLayout>, Job)| process(&layout, job),
      )?)
    } else {
      None
    };

    let delay = self.reorder_depth + self.thread_delay();
    ctx.config_mut().delay = delay as u32;
    self.layout = Some(Arc::new(StreamLayout::capture(ctx)));
    tracing::debug!(
      target: "codec_session",
      codec = self.descriptor.name,
      role = ?self.role,
      threads,
      reorder = self.reorder_depth,
      queue_depth = self.options.queue_depth,
      "reference codec opened"
    );
    Ok(())
  }

  fn send_packet(&mut self, ctx: &mut EngineContext<'_>, packet: Option<&Packet>) -> EngineResult<()> {
    if self.role != CodecType::Decoder {
      return Err(EngineError::invalid("not a decoder"));
    }
    let pkt = match packet {
      Some(pkt) if !pkt.is_flush_marker() => pkt,
      _ => return self.submit(None),
    };
    if self.layout.is_none() {
      return Err(EngineError::invalid("codec is not open"));
    }
    if self.draining {
      return Err(EngineError::eof());
    }
    if let Some((width, height)) = pkt.param_change() {
      if self.descriptor.media_type == MediaType::Video {
        self.apply_param_change(ctx, width, height)?;
      }
    }
    if pkt.is_empty() {
      return Ok(());
    }
    self.submit(Some(Job::Decode(pkt.clone())))
  }

  fn receive_frame(&mut self, _ctx: &mut EngineContext<'_>) -> EngineResult<Frame> {
    if self.role != CodecType::Decoder {
      return Err(EngineError::invalid("not a decoder"));
    }
    match self.next_output()? {
      Output::Frame(frame) => Ok(frame),
      Output::Packet(_) => Err(EngineError::new(ERROR_BUG, "decoder produced a packet")),
    }
  }

  fn send_frame(&mut self, _ctx: &mut EngineContext<'_>, frame: Option<&Frame>) -> EngineResult<()> {
    if self.role != CodecType::Encoder {
      return Err(EngineError::invalid("not an encoder"));
    }
    self.submit(frame.cloned().map(Job::Encode))
  }

  fn receive_packet(&mut self, _ctx: &mut EngineContext<'_>) -> EngineResult<Packet> {
    if self.role != CodecType::Encoder {
      return Err(EngineError::invalid("not an encoder"));
    }
    match self.next_output()? {
      Output::Packet(pkt) => Ok(pkt),
      Output::Frame(_) => Err(EngineError::new(ERROR_BUG, "encoder produced a frame")),
    }
  }

  fn flush(&mut self) {
    if let Some(pool) = self.pool.as_mut() {
      pool.flush();
    }
    self.pending.clear();
    self.ready.clear();
    self.draining = false;
  }

  fn close(&mut self) {
    self.pool = None;
    self.layout = None;
    self.pending.clear();
    self.ready.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec::CodecConfig;

  fn open_decoder(config: &mut CodecConfig, queue_depth: &str) -> RawCodec {
    let mut codec = RawCodec::new(&RAWVIDEO, CodecType::Decoder);
    codec.set_option("queue_depth", queue_depth).unwrap();
    let mut frames = None;
    let mut ctx = EngineContext::new(config, None, &mut frames, None);
    codec.open(&mut ctx).unwrap();
    codec
  }

  fn gray_packet(pts: i64, fill: u8) -> Packet {
    let mut pkt = Packet::from_vec(vec![fill; 4]);
    pkt.set_pts(pts);
    pkt.set_dts(pts);
    pkt
  }

  #[test]
  fn test_backpressure() {
    let mut config = CodecConfig::video(2, 2, PixelFormat::Gray8);
    let mut codec = open_decoder(&mut config, "1");
    let mut frames = None;
    let mut ctx = EngineContext::new(&mut config, None, &mut frames, None);

    codec.send_packet(&mut ctx, Some(&gray_packet(0, 1))).unwrap();
    let err = codec.send_packet(&mut ctx, Some(&gray_packet(1, 2))).unwrap_err();
    assert!(err.is_eagain());
    assert_eq!(codec.receive_frame(&mut ctx).unwrap().pts(), 0);
    codec.send_packet(&mut ctx, Some(&gray_packet(1, 2))).unwrap();
  }

  #[test]
  fn test_rejects_wrong_packet_size() {
    let mut config = CodecConfig::video(2, 2, PixelFormat::Gray8);
    let mut codec = open_decoder(&mut config, "8");
    let mut frames = None;
    let mut ctx = EngineContext::new(&mut config, None, &mut frames, None);
    let err = codec
      .send_packet(&mut ctx, Some(&Packet::from_vec(vec![0; 3])))
      .unwrap_err();
    assert_eq!(err.code, crate::engine::ERROR_INVALIDDATA);
  }

  #[test]
  fn test_reorder_by_pts() {
    let mut config = CodecConfig::video(2, 2, PixelFormat::Gray8);
    config.has_b_frames = 2;
    let mut codec = open_decoder(&mut config, "8");
    let mut frames = None;
    let mut ctx = EngineContext::new(&mut config, None, &mut frames, None);

    let mut out = Vec::new();
    for pts in [0, 3, 1, 2] {
      codec.send_packet(&mut ctx, Some(&gray_packet(pts, 0))).unwrap();
      while let Ok(frame) = codec.receive_frame(&mut ctx) {
        out.push(frame.pts());
      }
    }
    assert_eq!(out, vec![0, 1]);
    codec.send_packet(&mut ctx, None).unwrap();
    while let Ok(frame) = codec.receive_frame(&mut ctx) {
      out.push(frame.pts());
    }
    assert_eq!(out, vec![0, 1, 2, 3]);
    assert!(codec.receive_frame(&mut ctx).unwrap_err().is_eof());
  }

  #[test]
  fn test_audio_decoder_fills_sample_format() {
    let mut config = CodecConfig::audio(8_000, ChannelLayout::MONO, SampleFormat::None);
    let mut codec = RawCodec::new(&PCM_S16LE, CodecType::Decoder);
    let mut frames = None;
    let mut ctx = EngineContext::new(&mut config, None, &mut frames, None);
    codec.open(&mut ctx).unwrap();
    assert_eq!(ctx.config().sample_fmt, SampleFormat::S16);

    codec.send_packet(&mut ctx, Some(&Packet::from_vec(vec![0; 320]))).unwrap();
    let frame = codec.receive_frame(&mut ctx).unwrap();
    assert_eq!(frame.nb_samples(), 160);
    assert_eq!(frame.duration(), 160);
  }

  #[test]
  fn test_private_options() {
    let mut codec = RawCodec::new(&RAWVIDEO, CodecType::Decoder);
    codec.set_option("reorder", "3").unwrap();
    assert_eq!(codec.options().reorder, Some(3));
    codec.set_option("reorder", "-1").unwrap();
    assert_eq!(codec.options().reorder, None);
    assert!(codec.set_option("queue_depth", "0").is_err());
    assert_eq!(
      codec.set_option("crf", "1").unwrap_err().code,
      crate::engine::ERROR_OPTION_NOT_FOUND
    );

    codec.set_option("queue_depth", "2").unwrap();
    codec.reset_options();
    assert_eq!(codec.options(), ReferenceOptions::default());
  }

  #[test]
  fn test_create_checks_role() {
    assert!(RawCodec::create(&PCM_F32LE, CodecType::Encoder).is_ok());
    assert!(RawCodec::create(&RAWVIDEO, CodecType::Decoder).is_ok());
  }
}
