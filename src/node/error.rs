//! DOMException-style errors for the Node.js surface
//!
//! Session errors are thrown as `napi::Error`s whose message carries the
//! DOMException name as a prefix, e.g. `InvalidStateError: codec is closed`.
//! Flow-control outcomes are not errors here; they become status codes.

use napi::bindgen_prelude::*;

use crate::codec::{CodecError, CodecResult, ErrorKind};
use crate::engine::{ERROR_EAGAIN, ERROR_EOF};

/// DOMException error names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DOMExceptionName {
  /// Decoding or encoding failed inside the engine
  EncodingError,
  /// Unknown codec or unsupported configuration
  NotSupportedError,
  /// Protocol misuse (wrong mode or role, closed session)
  InvalidStateError,
  /// Malformed argument
  DataError,
  /// Out of memory or another resource limit
  QuotaExceededError,
}

impl DOMExceptionName {
  pub fn as_str(&self) -> &'static str {
    match self {
      DOMExceptionName::EncodingError => "EncodingError",
      DOMExceptionName::NotSupportedError => "NotSupportedError",
      DOMExceptionName::InvalidStateError => "InvalidStateError",
      DOMExceptionName::DataError => "DataError",
      DOMExceptionName::QuotaExceededError => "QuotaExceededError",
    }
  }

  /// Name used for a session error
  pub fn for_error(err: &CodecError) -> Self {
    match err.kind() {
      ErrorKind::InvalidState => DOMExceptionName::InvalidStateError,
      ErrorKind::Configuration => DOMExceptionName::NotSupportedError,
      ErrorKind::Allocation | ErrorKind::ResourceExhausted => DOMExceptionName::QuotaExceededError,
      ErrorKind::Engine | ErrorKind::WouldBlock | ErrorKind::EndOfStream => {
        DOMExceptionName::EncodingError
      }
    }
  }
}

/// Create an error with a DOMException-style name prefix
pub fn dom_exception(name: DOMExceptionName, message: &str) -> Error {
  Error::new(
    Status::GenericFailure,
    format!("{}: {}", name.as_str(), message),
  )
}

pub fn invalid_state_error(message: &str) -> Error {
  dom_exception(DOMExceptionName::InvalidStateError, message)
}

pub fn not_supported_error(message: &str) -> Error {
  dom_exception(DOMExceptionName::NotSupportedError, message)
}

pub fn data_error(message: &str) -> Error {
  dom_exception(DOMExceptionName::DataError, message)
}

/// Convert a session error
pub fn codec_error(err: CodecError) -> Error {
  dom_exception(DOMExceptionName::for_error(&err), &err.to_string())
}

/// Collapse a send/receive outcome into a status code
///
/// `0` on success, the would-block or end-of-stream code for flow control;
/// everything else is thrown.
pub fn status_code(result: CodecResult<()>) -> Result<i32> {
  match result {
    Ok(()) => Ok(0),
    Err(CodecError::WouldBlock) => Ok(ERROR_EAGAIN),
    Err(CodecError::EndOfStream) => Ok(ERROR_EOF),
    Err(e) => Err(codec_error(e)),
  }
}
