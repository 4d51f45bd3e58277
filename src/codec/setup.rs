//! Open-time preparation
//!
//! Everything `open` decides before the engine is touched: option routing,
//! generic parameter checks and thread resolution. Nothing here mutates the
//! session or the engine; the result is a staged [`OpenPlan`].

use crate::engine::{CodecDescriptor, CodecId, MediaType, PixelFormat, SampleFormat};

use super::config::CodecConfig;
use super::flags::{ThreadMode, ThreadType};
use super::options::{apply_context_option, Options};
use super::{CodecError, CodecResult, CodecType, HwFrameContext};

/// Staged result of option processing
#[derive(Debug)]
pub(crate) struct OpenPlan {
  /// Configuration the engine is opened with
  pub config: CodecConfig,
  /// Validated engine-private options, in the order given
  pub private: Vec<(String, String)>,
  /// Options nobody recognized
  pub leftover: Options,
}

fn invalid_option(key: &str, value: &str, msg: &str) -> CodecError {
  CodecError::InvalidConfig(format!(
    "invalid value '{}' for option '{}': {}",
    value, key, msg
  ))
}

/// Route options and validate a copy of `base`
pub(crate) fn prepare(
  role: CodecType,
  descriptor: &CodecDescriptor,
  base: &CodecConfig,
  codec_id: CodecId,
  options: Options,
  hw_frames: Option<&HwFrameContext>,
) -> CodecResult<OpenPlan> {
  let mut config = base.clone();
  config.codec_id = codec_id;

  if config.media_type == MediaType::Unknown {
    config.media_type = descriptor.media_type;
  } else if config.media_type != descriptor.media_type {
    return Err(CodecError::InvalidConfig(format!(
      "{} is a {} codec, session is {}",
      descriptor.name, descriptor.media_type, config.media_type
    )));
  }

  let mut private = Vec::new();
  let mut leftover = Options::new();
  for (key, value) in options {
    match apply_context_option(&mut config, &key, &value) {
      Some(Ok(())) => continue,
      Some(Err(msg)) => return Err(invalid_option(&key, &value, &msg)),
      None => {}
    }
    match descriptor.find_option(&key) {
      Some(desc) => {
        desc
          .validate(&value)
          .map_err(|msg| invalid_option(&key, &value, &msg))?;
        private.push((key, value));
      }
      None => {
        tracing::warn!(target: "codec_session", option = %key, codec = descriptor.name, "option not recognized");
        leftover.set(key, value);
      }
    }
  }

  if role == CodecType::Encoder {
    validate_encoder(descriptor, &config, hw_frames)?;
  }
  resolve_threads(descriptor, &mut config);

  Ok(OpenPlan {
    config,
    private,
    leftover,
  })
}

/// Encoder parameter checks common to every engine
fn validate_encoder(
  descriptor: &CodecDescriptor,
  config: &CodecConfig,
  hw_frames: Option<&HwFrameContext>,
) -> CodecResult<()> {
  if !config.time_base.is_valid() {
    return Err(CodecError::InvalidConfig(
      "the encoder time base is not set".into(),
    ));
  }
  match config.media_type {
    MediaType::Video => {
      if config.width == 0 || config.height == 0 {
        return Err(CodecError::InvalidConfig(format!(
          "invalid dimensions {}x{}",
          config.width, config.height
        )));
      }
      if config.pix_fmt == PixelFormat::None {
        return Err(CodecError::UnsupportedPixelFormat(config.pix_fmt));
      }
      if config.pix_fmt.is_hardware() {
        let frames_match = hw_frames.is_some_and(|f| f.hw_format() == config.pix_fmt);
        if !descriptor.capabilities.hardware || !frames_match {
          return Err(CodecError::UnsupportedPixelFormat(config.pix_fmt));
        }
      } else if !descriptor.supports_pix_fmt(config.pix_fmt) {
        return Err(CodecError::UnsupportedPixelFormat(config.pix_fmt));
      }
    }
    MediaType::Audio => {
      if config.sample_rate == 0 {
        return Err(CodecError::InvalidConfig("sample rate is not set".into()));
      }
      if config.ch_layout.is_empty() {
        return Err(CodecError::InvalidConfig("channel layout is not set".into()));
      }
      if config.sample_fmt == SampleFormat::None
        || !descriptor.supports_sample_fmt(config.sample_fmt)
      {
        return Err(CodecError::UnsupportedSampleFormat(config.sample_fmt));
      }
    }
    _ => {}
  }
  Ok(())
}

/// Pick the threading mode and resolve `thread_count = 0`
pub(crate) fn resolve_threads(descriptor: &CodecDescriptor, config: &mut CodecConfig) {
  if config.thread_count == 0 {
    config.thread_count = num_cpus::get().max(1) as u32;
  }
  let caps = descriptor.capabilities;
  config.active_thread_type = if config.thread_count <= 1 {
    ThreadType::empty()
  } else if caps.frame_threads && config.thread_type.contains(ThreadMode::Frame) {
    ThreadMode::Frame.into()
  } else if caps.slice_threads && config.thread_type.contains(ThreadMode::Slice) {
    ThreadMode::Slice.into()
  } else {
    ThreadType::empty()
  };
  if config.active_thread_type.is_empty() {
    config.thread_count = 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::{raw, Rational};

  fn opts(pairs: &[(&str, &str)]) -> Options {
    pairs.iter().copied().collect()
  }

  fn gray_config() -> CodecConfig {
    CodecConfig {
      codec_id: CodecId::RawVideo,
      time_base: Rational::new(1, 25),
      ..CodecConfig::video(2, 2, PixelFormat::Gray8)
    }
  }

  #[test]
  fn test_options_are_routed() {
    let plan = prepare(
      CodecType::Decoder,
      &raw::RAWVIDEO,
      &gray_config(),
      CodecId::RawVideo,
      opts(&[("g", "7"), ("queue_depth", "3"), ("crf", "20")]),
      None,
    )
    .unwrap();
    assert_eq!(plan.config.gop_size, 7);
    assert_eq!(plan.private, vec![("queue_depth".to_string(), "3".to_string())]);
    assert_eq!(plan.leftover.get("crf"), Some("20"));
  }

  #[test]
  fn test_invalid_value_rejected_before_anything_is_staged() {
    let err = prepare(
      CodecType::Decoder,
      &raw::RAWVIDEO,
      &gray_config(),
      CodecId::RawVideo,
      opts(&[("queue_depth", "1"), ("bf", "lots")]),
      None,
    )
    .unwrap_err();
    assert!(err.to_string().contains("'bf'"));
  }

  #[test]
  fn test_encoder_checks() {
    let mut config = gray_config();
    config.time_base = Rational::new(0, 1);
    let err = prepare(
      CodecType::Encoder,
      &raw::RAWVIDEO,
      &config,
      CodecId::RawVideo,
      Options::new(),
      None,
    )
    .unwrap_err();
    assert!(matches!(err, CodecError::InvalidConfig(_)));

    // Decoders skip the generic checks
    assert!(prepare(
      CodecType::Decoder,
      &raw::RAWVIDEO,
      &config,
      CodecId::RawVideo,
      Options::new(),
      None,
    )
    .is_ok());
  }

  #[test]
  fn test_resolve_threads() {
    let mut config = gray_config();
    config.thread_count = 4;
    resolve_threads(&raw::RAWVIDEO, &mut config);
    assert!(config.active_thread_type.contains(ThreadMode::Frame));
    assert_eq!(config.thread_count, 4);

    config.thread_type = ThreadMode::Slice.into();
    resolve_threads(&raw::RAWVIDEO, &mut config);
    assert!(config.active_thread_type.is_empty());
    assert_eq!(config.thread_count, 1);

    config.thread_count = 0;
    resolve_threads(&raw::PCM_S16LE, &mut config);
    assert!(config.thread_count >= 1);
  }
}
