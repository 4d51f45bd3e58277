//! Codec session and the data types that flow through it
//!
//! [`CodecContext`] is the session state machine. Packets, frames and
//! hardware contexts are reference-counted handles that can outlive the
//! session that produced them.

pub mod config;
pub mod context;
pub mod flags;
pub mod frame;
pub mod hwdevice;
pub mod hwframes;
pub mod negotiate;
pub mod options;
pub mod packet;
pub mod parameters;
mod setup;
pub mod worker;

pub use config::CodecConfig;
pub use context::{CodecContext, CodecType, SessionMode};
pub use flags::{CodecFlag, CodecFlag2, CodecFlags, CodecFlags2, ThreadMode, ThreadType};
pub use frame::Frame;
pub use hwdevice::HwDeviceContext;
pub use hwframes::{HwFrameConfig, HwFrameContext};
pub use negotiate::{GetFormatCallback, GetFormatContext};
pub use options::{OptionDescriptor, OptionKind, Options};
pub use packet::{Packet, PacketSideData};
pub use parameters::CodecParameters;
pub use worker::{OutputStream, SessionOutput, SessionWorker};

use crate::engine::{CodecId, EngineError, PixelFormat, SampleFormat};

/// Coarse classification of a [`CodecError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Protocol misuse; a programming error, not retried
  InvalidState,
  /// Flow control: drain the other direction, then retry
  WouldBlock,
  /// Stream fully drained; expected at the end
  EndOfStream,
  /// Allocation failure during operation
  ResourceExhausted,
  /// Bad open-time parameters; the session stays unopened
  Configuration,
  /// Opaque failure reported by the engine
  Engine,
  /// Session could not be constructed
  Allocation,
}

/// Codec error type
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
  #[error("{0}")]
  Engine(#[from] EngineError),

  #[error("Codec not found: {0}")]
  CodecNotFound(String),

  #[error("Encoder not found for codec: {0}")]
  EncoderNotFound(CodecId),

  #[error("Decoder not found for codec: {0}")]
  DecoderNotFound(CodecId),

  #[error("Failed to allocate {0}")]
  AllocationFailed(&'static str),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("Invalid state: {0}")]
  InvalidState(String),

  #[error("Resource temporarily unavailable, drain output first")]
  WouldBlock,

  #[error("End of stream")]
  EndOfStream,

  #[error("Resource exhausted: {0}")]
  ResourceExhausted(String),

  #[error("Unsupported pixel format: {0}")]
  UnsupportedPixelFormat(PixelFormat),

  #[error("Unsupported sample format: {0}")]
  UnsupportedSampleFormat(SampleFormat),

  #[error("Hardware acceleration error: {0}")]
  HardwareError(String),
}

impl CodecError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Engine(_) => ErrorKind::Engine,
      Self::CodecNotFound(_)
      | Self::EncoderNotFound(_)
      | Self::DecoderNotFound(_)
      | Self::InvalidConfig(_)
      | Self::UnsupportedPixelFormat(_)
      | Self::UnsupportedSampleFormat(_)
      | Self::HardwareError(_) => ErrorKind::Configuration,
      Self::AllocationFailed(_) => ErrorKind::Allocation,
      Self::InvalidState(_) => ErrorKind::InvalidState,
      Self::WouldBlock => ErrorKind::WouldBlock,
      Self::EndOfStream => ErrorKind::EndOfStream,
      Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
    }
  }

  #[inline]
  pub fn is_would_block(&self) -> bool {
    matches!(self, Self::WouldBlock)
  }

  #[inline]
  pub fn is_eof(&self) -> bool {
    matches!(self, Self::EndOfStream)
  }

  /// WouldBlock and EndOfStream are flow-control outcomes, not failures
  #[inline]
  pub fn is_flow_control(&self) -> bool {
    self.is_would_block() || self.is_eof()
  }

  /// Map an engine status from a send/receive call onto the session taxonomy
  pub(crate) fn from_io_status(err: EngineError) -> Self {
    if err.is_eagain() {
      Self::WouldBlock
    } else if err.is_eof() {
      Self::EndOfStream
    } else if err.is_invalid() {
      Self::InvalidState(err.message)
    } else if err.is_oom() {
      Self::ResourceExhausted(err.message)
    } else {
      Self::Engine(err)
    }
  }
}

pub type CodecResult<T> = Result<T, CodecError>;
