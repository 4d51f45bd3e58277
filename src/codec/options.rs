//! String options consumed at open
//!
//! Options are an ordered key/value dictionary. Generic context options
//! (`b`, `g`, `threads`, `flags`, ...) are applied to the configuration;
//! everything else is offered to the engine's private option table. Keys
//! nobody recognizes are handed back to the caller.

use crate::engine::{ChannelLayout, PixelFormat, Rational, SampleFormat};

use super::config::CodecConfig;
use super::flags::{CodecFlags, CodecFlags2, ThreadType};
use super::{CodecError, CodecResult};

/// Ordered string dictionary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
  entries: Vec<(String, String)>,
}

impl Options {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set a value, replacing an existing entry with the same key in place
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
    let key = key.into();
    let value = value.into();
    match self.entries.iter_mut().find(|(k, _)| *k == key) {
      Some(entry) => entry.1 = value,
      None => self.entries.push((key, value)),
    }
    self
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .entries
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }

  pub fn remove(&mut self, key: &str) -> Option<String> {
    let idx = self.entries.iter().position(|(k, _)| k == key)?;
    Some(self.entries.remove(idx).1)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(k, _)| k.as_str())
  }

  /// Parse `key=value` pairs separated by `:` (e.g. `"threads=4:g=30"`)
  pub fn parse(s: &str) -> CodecResult<Self> {
    let mut opts = Self::new();
    for pair in s.split(':').filter(|p| !p.trim().is_empty()) {
      let (key, value) = pair.split_once('=').ok_or_else(|| {
        CodecError::InvalidConfig(format!("option '{}' is missing a value", pair))
      })?;
      opts.set(key.trim(), value.trim());
    }
    Ok(opts)
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    let mut opts = Self::new();
    for (k, v) in iter {
      opts.set(k, v);
    }
    opts
  }
}

impl IntoIterator for Options {
  type Item = (String, String);
  type IntoIter = std::vec::IntoIter<(String, String)>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.into_iter()
  }
}

// ============================================================================
// Introspection
// ============================================================================

/// Value type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
  /// Integer in an inclusive range; `k`/`M`/`G` suffixes allowed
  Int { min: i64, max: i64 },
  /// Integer in range or the word `auto` (stored as 0)
  IntOrAuto { min: i64, max: i64 },
  Bool,
  /// Flag word in `+a-b` syntax
  Flags,
  Rational,
  PixelFormat,
  SampleFormat,
  /// `WIDTHxHEIGHT`
  ImageSize,
  String,
}

/// Describes one recognized option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDescriptor {
  pub name: &'static str,
  pub help: &'static str,
  pub kind: OptionKind,
  /// Default value in option syntax
  pub default: &'static str,
}

impl OptionDescriptor {
  /// Check a value against the option type without applying it
  pub fn validate(&self, value: &str) -> Result<(), String> {
    match self.kind {
      OptionKind::Int { min, max } => parse_int(value, min, max).map(|_| ()),
      OptionKind::IntOrAuto { min, max } => parse_int_or_auto(value, min, max).map(|_| ()),
      OptionKind::Bool => parse_bool(value).map(|_| ()),
      OptionKind::Flags | OptionKind::String => Ok(()),
      OptionKind::Rational => parse_rational(value).map(|_| ()),
      OptionKind::PixelFormat => parse_pix_fmt(value).map(|_| ()),
      OptionKind::SampleFormat => parse_sample_fmt(value).map(|_| ()),
      OptionKind::ImageSize => parse_image_size(value).map(|_| ()),
    }
  }
}

/// Options every session understands
pub static CONTEXT_OPTIONS: &[OptionDescriptor] = &[
  OptionDescriptor {
    name: "b",
    help: "set bitrate (in bits/s)",
    kind: OptionKind::Int { min: 0, max: i64::MAX },
    default: "0",
  },
  OptionDescriptor {
    name: "g",
    help: "set the group of picture (GOP) size",
    kind: OptionKind::Int { min: i32::MIN as i64, max: i32::MAX as i64 },
    default: "12",
  },
  OptionDescriptor {
    name: "bf",
    help: "set maximum number of B-frames between non-B-frames",
    kind: OptionKind::Int { min: 0, max: 16 },
    default: "0",
  },
  OptionDescriptor {
    name: "threads",
    help: "set the number of threads",
    kind: OptionKind::IntOrAuto { min: 0, max: 1024 },
    default: "1",
  },
  OptionDescriptor {
    name: "thread_type",
    help: "select multithreading type",
    kind: OptionKind::Flags,
    default: "slice+frame",
  },
  OptionDescriptor {
    name: "flags",
    help: "set codec flags",
    kind: OptionKind::Flags,
    default: "",
  },
  OptionDescriptor {
    name: "flags2",
    help: "set additional codec flags",
    kind: OptionKind::Flags,
    default: "",
  },
  OptionDescriptor {
    name: "time_base",
    help: "set the unit of frame timestamps",
    kind: OptionKind::Rational,
    default: "0/1",
  },
  OptionDescriptor {
    name: "pixel_format",
    help: "set pixel format",
    kind: OptionKind::PixelFormat,
    default: "none",
  },
  OptionDescriptor {
    name: "video_size",
    help: "set video size",
    kind: OptionKind::ImageSize,
    default: "0x0",
  },
  OptionDescriptor {
    name: "sample_fmt",
    help: "set sample format",
    kind: OptionKind::SampleFormat,
    default: "none",
  },
  OptionDescriptor {
    name: "ar",
    help: "set audio sampling rate (in Hz)",
    kind: OptionKind::Int { min: 0, max: i32::MAX as i64 },
    default: "0",
  },
  OptionDescriptor {
    name: "ac",
    help: "set number of audio channels",
    kind: OptionKind::Int { min: 0, max: 64 },
    default: "0",
  },
  OptionDescriptor {
    name: "has_b_frames",
    help: "set the decoder reorder depth",
    kind: OptionKind::Int { min: 0, max: 16 },
    default: "0",
  },
];

/// Look up a generic option; `sample_rate` is accepted as an alias of `ar`
pub fn find_context_option(name: &str) -> Option<&'static OptionDescriptor> {
  let name = if name == "sample_rate" { "ar" } else { name };
  CONTEXT_OPTIONS.iter().find(|d| d.name == name)
}

/// Apply a generic option to `config`
///
/// Returns `None` when `name` is not a generic option.
pub(crate) fn apply_context_option(
  config: &mut CodecConfig,
  name: &str,
  value: &str,
) -> Option<Result<(), String>> {
  let desc = find_context_option(name)?;
  let result = match desc.name {
    "b" => parse_int(value, 0, i64::MAX).map(|v| config.bit_rate = v),
    "g" => parse_int(value, i32::MIN as i64, i32::MAX as i64).map(|v| config.gop_size = v as i32),
    "bf" => parse_int(value, 0, 16).map(|v| config.max_b_frames = v as u32),
    "threads" => parse_int_or_auto(value, 0, 1024).map(|v| config.thread_count = v as u32),
    "thread_type" => config
      .thread_type
      .apply_str(value)
      .map(|t: ThreadType| config.thread_type = t),
    "flags" => config
      .flags
      .apply_str(value)
      .map(|f: CodecFlags| config.flags = f),
    "flags2" => config
      .flags2
      .apply_str(value)
      .map(|f: CodecFlags2| config.flags2 = f),
    "time_base" => parse_rational(value).map(|r| config.time_base = r),
    "pixel_format" => parse_pix_fmt(value).map(|f| config.pix_fmt = f),
    "video_size" => parse_image_size(value).map(|(w, h)| {
      config.width = w;
      config.height = h;
      config.coded_width = w;
      config.coded_height = h;
    }),
    "sample_fmt" => parse_sample_fmt(value).map(|f| config.sample_fmt = f),
    "ar" => parse_int(value, 0, i32::MAX as i64).map(|v| config.sample_rate = v as u32),
    "ac" => parse_int(value, 0, 64).map(|v| config.ch_layout = ChannelLayout::default_for(v as u32)),
    "has_b_frames" => parse_int(value, 0, 16).map(|v| config.has_b_frames = v as u32),
    _ => return None,
  };
  Some(result)
}

// ============================================================================
// Value parsers
// ============================================================================

pub(crate) fn parse_int(value: &str, min: i64, max: i64) -> Result<i64, String> {
  let value = value.trim();
  let (digits, scale) = match value.char_indices().last() {
    Some((idx, 'k')) | Some((idx, 'K')) => (&value[..idx], 1_000),
    Some((idx, 'M')) => (&value[..idx], 1_000_000),
    Some((idx, 'G')) => (&value[..idx], 1_000_000_000),
    _ => (value, 1),
  };
  let parsed = digits
    .parse::<i64>()
    .ok()
    .and_then(|v| v.checked_mul(scale))
    .ok_or_else(|| format!("'{}' is not an integer", value))?;
  if parsed < min || parsed > max {
    return Err(format!("{} is out of range [{} - {}]", parsed, min, max));
  }
  Ok(parsed)
}

pub(crate) fn parse_int_or_auto(value: &str, min: i64, max: i64) -> Result<i64, String> {
  if value.trim().eq_ignore_ascii_case("auto") {
    Ok(0)
  } else {
    parse_int(value, min, max)
  }
}

pub(crate) fn parse_bool(value: &str) -> Result<bool, String> {
  match value.trim() {
    "1" | "true" | "on" | "yes" => Ok(true),
    "0" | "false" | "off" | "no" => Ok(false),
    other => Err(format!("'{}' is not a boolean", other)),
  }
}

fn parse_rational(value: &str) -> Result<Rational, String> {
  value
    .parse::<Rational>()
    .map_err(|_| format!("'{}' is not a rational", value))
}

fn parse_pix_fmt(value: &str) -> Result<PixelFormat, String> {
  PixelFormat::from_name(value.trim()).ok_or_else(|| format!("unknown pixel format '{}'", value))
}

fn parse_sample_fmt(value: &str) -> Result<SampleFormat, String> {
  SampleFormat::from_name(value.trim()).ok_or_else(|| format!("unknown sample format '{}'", value))
}

fn parse_image_size(value: &str) -> Result<(u32, u32), String> {
  let (w, h) = value
    .trim()
    .split_once('x')
    .ok_or_else(|| format!("'{}' is not WIDTHxHEIGHT", value))?;
  match (w.parse::<u32>(), h.parse::<u32>()) {
    (Ok(w), Ok(h)) => Ok((w, h)),
    _ => Err(format!("'{}' is not WIDTHxHEIGHT", value)),
  }
}
