#![deny(clippy::all)]

//! Codec session state machine
//!
//! A [`CodecContext`] wraps one encoder or decoder instance and drives it
//! through the send/receive protocol: submit packets (or frames), pull frames
//! (or packets), drain with a flush marker, reset with `flush()`. Engines plug
//! in through the [`engine::CodecEngine`] trait; the crate ships a reference
//! engine for uncompressed video and PCM audio.

// Engine contract, status codes, registry and reference engine
pub mod engine;

// Session, data types and configuration
pub mod codec;

// Node.js surface (NAPI classes)
#[cfg(feature = "node")]
pub mod node;

pub use codec::{
  CodecConfig, CodecContext, CodecError, CodecParameters, CodecResult, CodecType, ErrorKind,
  Frame, HwDeviceContext, HwFrameConfig, HwFrameContext, Options, Packet, SessionMode,
  SessionOutput, SessionWorker,
};
pub use engine::{
  ChannelLayout, CodecDescriptor, CodecEngine, CodecId, EngineContext, EngineError, MediaType,
  PixelFormat, Rational, SampleFormat,
};
