//! Pixel format negotiation for video decoders
//!
//! When a decoder has to pick an output pixel format it offers an ordered
//! candidate list (most preferred first) to the session's format callback.
//! Hardware formats are only usable if the callback installs a matching
//! hardware frames context before returning.

use crate::engine::{EngineError, EngineResult, PixelFormat, ERROR_ENOSYS};

use super::config::CodecConfig;
use super::hwdevice::HwDeviceContext;
use super::hwframes::{HwFrameConfig, HwFrameContext};
use super::{CodecError, CodecResult};

/// User-supplied format selection
///
/// Receives a view of the session and the candidate list; must return one of
/// the candidates.
pub type GetFormatCallback =
  Box<dyn FnMut(&mut GetFormatContext<'_>, &[PixelFormat]) -> PixelFormat + Send>;

/// Session state visible to the format callback
pub struct GetFormatContext<'a> {
  config: &'a CodecConfig,
  hw_device: Option<&'a HwDeviceContext>,
  hw_frames: &'a mut Option<HwFrameContext>,
}

impl<'a> GetFormatContext<'a> {
  pub(crate) fn new(
    config: &'a CodecConfig,
    hw_device: Option<&'a HwDeviceContext>,
    hw_frames: &'a mut Option<HwFrameContext>,
  ) -> Self {
    Self {
      config,
      hw_device,
      hw_frames,
    }
  }

  /// Configuration as of this invocation
  pub fn config(&self) -> &CodecConfig {
    self.config
  }

  pub fn coded_width(&self) -> u32 {
    self.config.coded_width
  }

  pub fn coded_height(&self) -> u32 {
    self.config.coded_height
  }

  /// Software format of the stream being decoded
  pub fn sw_pix_fmt(&self) -> PixelFormat {
    self.config.software_pix_fmt()
  }

  pub fn hw_device_ctx(&self) -> Option<&HwDeviceContext> {
    self.hw_device
  }

  pub fn hw_frames_ctx(&self) -> Option<&HwFrameContext> {
    self.hw_frames.as_ref()
  }

  /// Install a frames context, releasing the previous one
  pub fn set_hw_frames_ctx(&mut self, frames: HwFrameContext) {
    *self.hw_frames = Some(frames);
  }

  /// Create and install a frames context for `hw_format` on the session's device
  ///
  /// Surfaces match the coded dimensions and the stream's software format.
  pub fn init_hw_frames_ctx(&mut self, hw_format: PixelFormat) -> CodecResult<HwFrameContext> {
    let device = self.hw_device.ok_or_else(|| {
      CodecError::HardwareError("no hardware device context on this session".into())
    })?;
    if device.pixel_format() != hw_format {
      return Err(CodecError::HardwareError(format!(
        "{} device cannot provide {} surfaces",
        device.device_name(),
        hw_format
      )));
    }
    let (width, height) = if self.config.coded_width > 0 && self.config.coded_height > 0 {
      (self.config.coded_width, self.config.coded_height)
    } else {
      (self.config.width, self.config.height)
    };
    let frames = HwFrameContext::new(
      device,
      HwFrameConfig {
        width,
        height,
        sw_format: self.sw_pix_fmt(),
        hw_format: Some(hw_format),
        pool_size: 0,
      },
    )?;
    *self.hw_frames = Some(frames.clone());
    Ok(frames)
  }
}

/// First software format of the list, or the first entry if all are hardware
pub fn default_get_format(candidates: &[PixelFormat]) -> PixelFormat {
  candidates
    .iter()
    .copied()
    .find(|f| !f.is_hardware())
    .or_else(|| candidates.first().copied())
    .unwrap_or(PixelFormat::None)
}

/// Run one negotiation round and record the result in `config`
///
/// The held frames reference is released before the callback runs.
pub(crate) fn negotiate(
  config: &mut CodecConfig,
  hw_device: Option<&HwDeviceContext>,
  hw_frames: &mut Option<HwFrameContext>,
  callback: Option<&mut GetFormatCallback>,
  candidates: &[PixelFormat],
) -> EngineResult<PixelFormat> {
  if candidates.is_empty() {
    return Err(EngineError::invalid_data("no candidate pixel formats"));
  }

  *hw_frames = None;

  let chosen = match callback {
    Some(cb) => {
      let mut view = GetFormatContext::new(config, hw_device, hw_frames);
      cb(&mut view, candidates)
    }
    None => default_get_format(candidates),
  };

  if !candidates.contains(&chosen) {
    tracing::warn!(target: "codec_session", chosen = %chosen, ?candidates, "format callback returned a format outside the candidate list");
    return Err(EngineError::invalid_data(format!(
      "format callback returned {}, which was not offered",
      chosen
    )));
  }

  if chosen.is_hardware() {
    let frames = hw_frames
      .as_ref()
      .filter(|f| f.hw_format() == chosen)
      .ok_or_else(|| {
        EngineError::new(
          ERROR_ENOSYS,
          format!("{} chosen without a matching hardware frames context", chosen),
        )
      })?;
    config.sw_pix_fmt = frames.sw_format();
  } else {
    config.sw_pix_fmt = chosen;
  }
  config.pix_fmt = chosen;

  tracing::debug!(target: "codec_session", format = %chosen, "pixel format negotiated");
  Ok(chosen)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::HwDeviceType;

  fn candidates() -> [PixelFormat; 2] {
    [PixelFormat::Cuda, PixelFormat::Nv12]
  }

  fn boxed<F>(f: F) -> GetFormatCallback
  where
    F: FnMut(&mut GetFormatContext<'_>, &[PixelFormat]) -> PixelFormat + Send + 'static,
  {
    Box::new(f)
  }

  #[test]
  fn test_default_picks_software() {
    assert_eq!(default_get_format(&candidates()), PixelFormat::Nv12);
    assert_eq!(default_get_format(&[PixelFormat::Vaapi]), PixelFormat::Vaapi);
    assert_eq!(default_get_format(&[]), PixelFormat::None);
  }

  #[test]
  fn test_callback_picks_software() {
    let mut config = CodecConfig::video(16, 16, PixelFormat::Nv12);
    let mut frames = None;
    let mut cb = boxed(|_, list| list[1]);
    let chosen = negotiate(&mut config, None, &mut frames, Some(&mut cb), &candidates()).unwrap();
    assert_eq!(chosen, PixelFormat::Nv12);
    assert_eq!(config.pix_fmt, PixelFormat::Nv12);
    assert!(frames.is_none());
  }

  #[test]
  fn test_out_of_list_rejected() {
    let mut config = CodecConfig::video(16, 16, PixelFormat::Nv12);
    let mut frames = None;
    let mut cb = boxed(|_, _| PixelFormat::Rgba);
    let err = negotiate(&mut config, None, &mut frames, Some(&mut cb), &candidates()).unwrap_err();
    assert_eq!(err.code, crate::engine::ERROR_INVALIDDATA);
    assert_eq!(config.pix_fmt, PixelFormat::Nv12);
  }

  #[test]
  fn test_hardware_without_frames_rejected() {
    let mut config = CodecConfig::video(16, 16, PixelFormat::Nv12);
    let mut frames = None;
    let mut cb = boxed(|_, list| list[0]);
    let err = negotiate(&mut config, None, &mut frames, Some(&mut cb), &candidates()).unwrap_err();
    assert_eq!(err.code, ERROR_ENOSYS);
  }

  #[test]
  fn test_hardware_with_frames_installed() {
    let device = HwDeviceContext::new(HwDeviceType::Cuda, None).unwrap();
    let mut config = CodecConfig::video(16, 16, PixelFormat::Nv12);
    let mut frames = None;
    let mut cb = boxed(|ctx, list| {
      let hw = list[0];
      match ctx.init_hw_frames_ctx(hw) {
        Ok(_) => hw,
        Err(_) => list[1],
      }
    });
    let chosen =
      negotiate(&mut config, Some(&device), &mut frames, Some(&mut cb), &candidates()).unwrap();
    assert_eq!(chosen, PixelFormat::Cuda);
    assert_eq!(config.sw_pix_fmt, PixelFormat::Nv12);
    let installed = frames.as_ref().unwrap();
    assert_eq!((installed.width(), installed.height()), (16, 16));
    assert!(installed.device().same_device(&device));
  }

  #[test]
  fn test_previous_frames_released_before_callback() {
    let device = HwDeviceContext::new(HwDeviceType::Cuda, None).unwrap();
    let old = HwFrameContext::new(&device, HwFrameConfig::default()).unwrap();
    let mut frames = Some(old.clone());
    let mut config = CodecConfig::video(16, 16, PixelFormat::Nv12);
    let mut cb = boxed(|ctx, list| {
      assert!(ctx.hw_frames_ctx().is_none());
      list[1]
    });
    negotiate(&mut config, Some(&device), &mut frames, Some(&mut cb), &candidates()).unwrap();
    assert_eq!(old.ref_count(), 1);
  }
}
