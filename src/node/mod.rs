//! Node.js binding
//!
//! Exposes the codec session to JavaScript via NAPI-RS. Enabled with the
//! `node` cargo feature.

mod codec_context;
pub mod error;

pub use codec_context::{JsCodecContext, JsCodecParameters, JsFrame, JsPacket, JsRational};
