//! Engine status codes
//!
//! Engines report outcomes with negative integer codes: negated errno values
//! for the POSIX conditions and four-character tags for the rest. The session
//! maps these onto its own error taxonomy.

use std::fmt;
use std::os::raw::c_int;

// ============================================================================
// Error Codes
// ============================================================================

/// End of file / stream reached
pub const ERROR_EOF: c_int = fferrtag(b'E', b'O', b'F', b' ');

/// Internal bug (should never happen)
pub const ERROR_BUG: c_int = fferrtag(b'B', b'U', b'G', b'!');

/// Decoder not found
pub const ERROR_DECODER_NOT_FOUND: c_int = fferrtag(0xF8, b'D', b'E', b'C');

/// Encoder not found
pub const ERROR_ENCODER_NOT_FOUND: c_int = fferrtag(0xF8, b'E', b'N', b'C');

/// External error
pub const ERROR_EXTERNAL: c_int = fferrtag(b'E', b'X', b'T', b' ');

/// Invalid data found
pub const ERROR_INVALIDDATA: c_int = fferrtag(b'I', b'N', b'D', b'A');

/// Option not found
pub const ERROR_OPTION_NOT_FOUND: c_int = fferrtag(0xF8, b'O', b'P', b'T');

/// Not yet implemented
pub const ERROR_PATCHWELCOME: c_int = fferrtag(b'P', b'A', b'W', b'E');

/// Unknown error
pub const ERROR_UNKNOWN: c_int = fferrtag(b'U', b'N', b'K', b'N');

/// Input changed between calls
pub const ERROR_INPUT_CHANGED: c_int = -0x636e6701;

/// Output changed between calls
pub const ERROR_OUTPUT_CHANGED: c_int = -0x636e6702;

// POSIX error codes (negated) - platform specific

/// Resource temporarily unavailable (try again)
/// Linux: EAGAIN = 11, macOS: EAGAIN = 35
#[cfg(target_os = "macos")]
pub const ERROR_EAGAIN: c_int = -35;

#[cfg(not(target_os = "macos"))]
pub const ERROR_EAGAIN: c_int = -11;

/// Out of memory
pub const ERROR_ENOMEM: c_int = -12;

/// Invalid argument
pub const ERROR_EINVAL: c_int = -22;

/// Function not implemented
pub const ERROR_ENOSYS: c_int = -38;

// ============================================================================
// Error Tag Helper
// ============================================================================

/// Create an error tag from 4 bytes
const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> c_int {
  -((a as c_int) | ((b as c_int) << 8) | ((c as c_int) << 16) | ((d as c_int) << 24))
}

// ============================================================================
// Engine Error Type
// ============================================================================

/// Engine status with code and message
#[derive(Clone, PartialEq, Eq)]
pub struct EngineError {
  /// Error code (negative)
  pub code: c_int,
  /// Human-readable message
  pub message: String,
}

impl EngineError {
  /// Create error from a code, using the built-in description
  pub fn from_code(code: c_int) -> Self {
    Self {
      code,
      message: get_error_message(code).to_string(),
    }
  }

  /// Create error with custom message
  pub fn new(code: c_int, message: impl Into<String>) -> Self {
    Self {
      code,
      message: message.into(),
    }
  }

  /// Try again later
  pub fn again() -> Self {
    Self::from_code(ERROR_EAGAIN)
  }

  /// End of stream
  pub fn eof() -> Self {
    Self::from_code(ERROR_EOF)
  }

  /// Invalid argument with context
  pub fn invalid(message: impl Into<String>) -> Self {
    Self::new(ERROR_EINVAL, message)
  }

  /// Invalid data with context
  pub fn invalid_data(message: impl Into<String>) -> Self {
    Self::new(ERROR_INVALIDDATA, message)
  }

  /// Out of memory with context
  pub fn oom(message: impl Into<String>) -> Self {
    Self::new(ERROR_ENOMEM, message)
  }

  /// Check if this is EAGAIN (resource temporarily unavailable)
  #[inline]
  pub fn is_eagain(&self) -> bool {
    self.code == ERROR_EAGAIN
  }

  /// Check if this is EOF
  #[inline]
  pub fn is_eof(&self) -> bool {
    self.code == ERROR_EOF
  }

  /// Check if this is an invalid argument error
  #[inline]
  pub fn is_invalid(&self) -> bool {
    self.code == ERROR_EINVAL
  }

  /// Check if this is an out of memory error
  #[inline]
  pub fn is_oom(&self) -> bool {
    self.code == ERROR_ENOMEM
  }
}

impl fmt::Debug for EngineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EngineError")
      .field("code", &self.code)
      .field("message", &self.message)
      .finish()
  }
}

impl fmt::Display for EngineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "engine error {}: {}", self.code, self.message)
  }
}

impl std::error::Error for EngineError {}

// ============================================================================
// Result Type
// ============================================================================

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Error Checking
// ============================================================================

/// Check a raw return code and convert to Result
///
/// Returns Ok with the value if >= 0, Err with EngineError if < 0
#[inline]
pub fn check_error(ret: c_int) -> EngineResult<c_int> {
  if ret < 0 {
    Err(EngineError::from_code(ret))
  } else {
    Ok(ret)
  }
}

/// Get the built-in description for an error code
pub fn get_error_message(code: c_int) -> &'static str {
  match code {
    ERROR_EOF => "End of file",
    ERROR_BUG => "Internal bug, should not have happened",
    ERROR_DECODER_NOT_FOUND => "Decoder not found",
    ERROR_ENCODER_NOT_FOUND => "Encoder not found",
    ERROR_EXTERNAL => "Generic error in an external library",
    ERROR_INVALIDDATA => "Invalid data found when processing input",
    ERROR_OPTION_NOT_FOUND => "Option not found",
    ERROR_PATCHWELCOME => "Not yet implemented",
    ERROR_UNKNOWN => "Unknown error occurred",
    ERROR_INPUT_CHANGED => "Input changed between calls",
    ERROR_OUTPUT_CHANGED => "Output changed between calls",
    ERROR_EAGAIN => "Resource temporarily unavailable",
    ERROR_ENOMEM => "Cannot allocate memory",
    ERROR_EINVAL => "Invalid argument",
    ERROR_ENOSYS => "Function not implemented",
    _ => "Error number not known",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_codes() {
    assert!(ERROR_EOF < 0);
    assert!(ERROR_EAGAIN < 0);
    assert!(ERROR_EINVAL < 0);
    assert_ne!(ERROR_EOF, ERROR_INVALIDDATA);
  }

  #[test]
  fn test_check_error() {
    assert!(check_error(0).is_ok());
    assert!(check_error(100).is_ok());
    assert!(check_error(-1).is_err());
    assert!(check_error(ERROR_EAGAIN).unwrap_err().is_eagain());
  }

  #[test]
  fn test_messages() {
    assert_eq!(EngineError::eof().message, "End of file");
    assert_eq!(get_error_message(-9999), "Error number not known");
    let err = EngineError::invalid("codec not opened");
    assert!(err.is_invalid());
    assert_eq!(err.to_string(), format!("engine error {}: codec not opened", ERROR_EINVAL));
  }
}
