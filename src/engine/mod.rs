//! Codec engine contract
//!
//! An engine is the external collaborator that actually transforms packets
//! into frames (or back). The session drives it through [`CodecEngine`] and
//! interprets its status codes. Engines are looked up by codec id in the
//! [`registry`]; the crate ships a reference engine for uncompressed codecs.

pub mod error;
pub mod raw;
pub mod registry;
pub(crate) mod threading;
pub mod types;

pub use error::*;
pub use registry::{CodecRegistry, EngineFactory};
pub use types::*;

use crate::codec::negotiate::{self, GetFormatCallback};
use crate::codec::{
  CodecConfig, CodecType, Frame, HwDeviceContext, HwFrameContext, OptionDescriptor, Packet,
};

/// What an engine can do beyond plain one-in/one-out operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
  pub decoder: bool,
  pub encoder: bool,
  /// Output may lag input; the engine must be drained with a flush marker
  pub delay: bool,
  pub frame_threads: bool,
  pub slice_threads: bool,
  /// Can produce or consume hardware frames
  pub hardware: bool,
}

/// Static description of a codec implementation
#[derive(Debug)]
pub struct CodecDescriptor {
  pub id: CodecId,
  pub name: &'static str,
  pub long_name: &'static str,
  pub media_type: MediaType,
  pub capabilities: Capabilities,
  /// Accepted pixel formats, empty when unrestricted
  pub pix_fmts: &'static [PixelFormat],
  /// Accepted sample formats, empty when unrestricted
  pub sample_fmts: &'static [SampleFormat],
  /// Engine-private options
  pub options: &'static [OptionDescriptor],
}

impl CodecDescriptor {
  pub fn supports(&self, role: CodecType) -> bool {
    match role {
      CodecType::Decoder => self.capabilities.decoder,
      CodecType::Encoder => self.capabilities.encoder,
    }
  }

  pub fn supports_pix_fmt(&self, fmt: PixelFormat) -> bool {
    self.pix_fmts.is_empty() || self.pix_fmts.contains(&fmt)
  }

  pub fn supports_sample_fmt(&self, fmt: SampleFormat) -> bool {
    self.sample_fmts.is_empty() || self.sample_fmts.contains(&fmt)
  }

  pub fn find_option(&self, name: &str) -> Option<&'static OptionDescriptor> {
    self.options.iter().find(|o| o.name == name)
  }
}

/// Session state lent to an engine for the duration of one call
///
/// Gives access to the configuration snapshot, the hardware contexts and the
/// format negotiation hook.
pub struct EngineContext<'a> {
  config: &'a mut CodecConfig,
  hw_device: Option<&'a HwDeviceContext>,
  hw_frames: &'a mut Option<HwFrameContext>,
  get_format: Option<&'a mut GetFormatCallback>,
}

impl<'a> EngineContext<'a> {
  pub(crate) fn new(
    config: &'a mut CodecConfig,
    hw_device: Option<&'a HwDeviceContext>,
    hw_frames: &'a mut Option<HwFrameContext>,
    get_format: Option<&'a mut GetFormatCallback>,
  ) -> Self {
    Self {
      config,
      hw_device,
      hw_frames,
      get_format,
    }
  }

  pub fn config(&self) -> &CodecConfig {
    &*self.config
  }

  pub fn config_mut(&mut self) -> &mut CodecConfig {
    self.config
  }

  pub fn hw_device(&self) -> Option<&HwDeviceContext> {
    self.hw_device
  }

  pub fn hw_frames(&self) -> Option<&HwFrameContext> {
    self.hw_frames.as_ref()
  }

  /// Candidate formats for the current stream, most preferred first
  ///
  /// The device's surface format leads when a device is attached; the
  /// stream's software format always closes the list.
  pub fn format_candidates(&self) -> Vec<PixelFormat> {
    let mut list = Vec::with_capacity(2);
    if let Some(device) = self.hw_device {
      list.push(device.pixel_format());
    }
    list.push(self.config.software_pix_fmt());
    list
  }

  /// Ask the session to pick one of `candidates`
  ///
  /// On success the chosen format is the active `pix_fmt`.
  pub fn get_format(&mut self, candidates: &[PixelFormat]) -> EngineResult<PixelFormat> {
    negotiate::negotiate(
      self.config,
      self.hw_device,
      self.hw_frames,
      self.get_format.as_deref_mut(),
      candidates,
    )
  }
}

/// One codec instance
///
/// Send/receive calls report flow control through status codes:
/// `EAGAIN` when the other direction must be drained first, `EOF` once fully
/// drained after the flush marker. A `None` input is the flush marker.
pub trait CodecEngine: Send {
  fn descriptor(&self) -> &'static CodecDescriptor;

  /// Set a private option listed in the descriptor
  fn set_option(&mut self, name: &str, _value: &str) -> EngineResult<()> {
    Err(EngineError::new(
      ERROR_OPTION_NOT_FOUND,
      format!("no private option '{}'", name),
    ))
  }

  /// Restore private options to their defaults
  fn reset_options(&mut self) {}

  /// Initialize from the (already validated) configuration
  ///
  /// After a failed open the engine may be opened again.
  fn open(&mut self, ctx: &mut EngineContext<'_>) -> EngineResult<()>;

  fn send_packet(&mut self, _ctx: &mut EngineContext<'_>, _packet: Option<&Packet>) -> EngineResult<()> {
    Err(EngineError::invalid("engine is not a decoder"))
  }

  fn receive_frame(&mut self, _ctx: &mut EngineContext<'_>) -> EngineResult<Frame> {
    Err(EngineError::invalid("engine is not a decoder"))
  }

  fn send_frame(&mut self, _ctx: &mut EngineContext<'_>, _frame: Option<&Frame>) -> EngineResult<()> {
    Err(EngineError::invalid("engine is not an encoder"))
  }

  fn receive_packet(&mut self, _ctx: &mut EngineContext<'_>) -> EngineResult<Packet> {
    Err(EngineError::invalid("engine is not an encoder"))
  }

  /// Drop buffered input, reordered output and in-flight work
  fn flush(&mut self);

  /// Release everything; no call follows except drop
  fn close(&mut self) {}
}
