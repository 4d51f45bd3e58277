//! Shared handle to a hardware frames context
//!
//! A frames context describes a pool of device surfaces (hardware format,
//! software format, dimensions). It keeps its device alive through its own
//! device reference.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::PixelFormat;

use super::{CodecError, CodecResult, frame::Frame, hwdevice::HwDeviceContext};

/// Configuration for creating a hardware frames context
#[derive(Debug, Clone)]
pub struct HwFrameConfig {
  /// Width of frames in the pool
  pub width: u32,
  /// Height of frames in the pool
  pub height: u32,
  /// Software pixel format (format of CPU frames before upload)
  pub sw_format: PixelFormat,
  /// Hardware pixel format (format on GPU) - if None, derived from the device type
  pub hw_format: Option<PixelFormat>,
  /// Fixed pool size, 0 for a pool that grows on demand
  pub pool_size: u32,
}

impl Default for HwFrameConfig {
  fn default() -> Self {
    Self {
      width: 1920,
      height: 1080,
      sw_format: PixelFormat::Nv12, // Most hardware encoders prefer NV12
      hw_format: None,
      pool_size: 20,
    }
  }
}

struct HwFramesInner {
  device: HwDeviceContext,
  sw_format: PixelFormat,
  hw_format: PixelFormat,
  width: u32,
  height: u32,
  pool_size: u32,
  allocated: AtomicUsize,
}

/// Reference-counted hardware frames context
#[derive(Clone)]
pub struct HwFrameContext {
  inner: Arc<HwFramesInner>,
}

/// One pool surface; returned to the pool when the last frame referencing it drops
pub(crate) struct HwSurface {
  ctx: HwFrameContext,
}

impl HwSurface {
  pub(crate) fn frames_ctx(&self) -> &HwFrameContext {
    &self.ctx
  }
}

impl Drop for HwSurface {
  fn drop(&mut self) {
    self.ctx.inner.allocated.fetch_sub(1, Ordering::Relaxed);
  }
}

impl HwFrameContext {
  /// Create a new hardware frames context
  ///
  /// # Arguments
  /// * `device` - The hardware device context to create frames for
  /// * `config` - Configuration for the frame pool
  pub fn new(device: &HwDeviceContext, config: HwFrameConfig) -> CodecResult<Self> {
    let hw_format = config.hw_format.unwrap_or_else(|| device.pixel_format());

    if !hw_format.is_hardware() {
      return Err(CodecError::HardwareError(format!(
        "{} is not a hardware pixel format",
        hw_format
      )));
    }
    if config.sw_format.is_hardware() || config.sw_format == PixelFormat::None {
      return Err(CodecError::HardwareError(format!(
        "invalid software pixel format {}",
        config.sw_format
      )));
    }
    if config.width == 0 || config.height == 0 {
      return Err(CodecError::HardwareError(
        "hardware frames context needs non-zero dimensions".into(),
      ));
    }

    Ok(Self {
      inner: Arc::new(HwFramesInner {
        device: device.clone(),
        sw_format: config.sw_format,
        hw_format,
        width: config.width,
        height: config.height,
        pool_size: config.pool_size,
        allocated: AtomicUsize::new(0),
      }),
    })
  }

  /// Allocate a new frame from the hardware frame pool
  ///
  /// Fixed-size pools refuse to hand out more surfaces than configured. The
  /// surface goes back to the pool once every reference to the frame is gone.
  pub fn allocate_frame(&self) -> CodecResult<Frame> {
    let pool = self.inner.pool_size as usize;
    let taken = self.inner.allocated.fetch_add(1, Ordering::Relaxed);
    if pool > 0 && taken >= pool {
      self.inner.allocated.fetch_sub(1, Ordering::Relaxed);
      return Err(CodecError::ResourceExhausted(format!(
        "hardware frame pool of {} surfaces exhausted",
        pool
      )));
    }

    let mut frame = Frame::new();
    frame.set_dimensions(self.inner.width, self.inner.height);
    frame.set_format(self.inner.hw_format);
    frame.set_surface(Arc::new(HwSurface { ctx: self.clone() }));
    Ok(frame)
  }

  /// Surfaces currently handed out
  pub fn surfaces_in_use(&self) -> usize {
    self.inner.allocated.load(Ordering::Relaxed)
  }

  /// Upload a CPU frame to a device surface
  ///
  /// The input frame must match the pool's dimensions and software format.
  pub fn upload_frame(&self, sw_frame: &Frame) -> CodecResult<Frame> {
    if sw_frame.format() != self.inner.sw_format
      || sw_frame.width() != self.inner.width
      || sw_frame.height() != self.inner.height
    {
      return Err(CodecError::HardwareError(format!(
        "cannot upload {}x{} {} into a {}x{} {} pool",
        sw_frame.width(),
        sw_frame.height(),
        sw_frame.format(),
        self.inner.width,
        self.inner.height,
        self.inner.sw_format
      )));
    }

    let mut hw_frame = self.allocate_frame()?;
    hw_frame.share_data(sw_frame);
    hw_frame.copy_props(sw_frame);
    Ok(hw_frame)
  }

  /// Download a device surface into a CPU frame in the pool's software format
  pub fn download_frame(&self, hw_frame: &Frame) -> CodecResult<Frame> {
    if !hw_frame
      .hw_frames_ctx()
      .is_some_and(|ctx| ctx.same_context(self))
    {
      return Err(CodecError::HardwareError(
        "frame does not belong to this frames context".into(),
      ));
    }

    let mut sw_frame = if hw_frame.data().is_empty() {
      Frame::new_video(self.inner.width, self.inner.height, self.inner.sw_format)?
    } else {
      Frame::from_video_data(
        self.inner.width,
        self.inner.height,
        self.inner.sw_format,
        hw_frame.data().to_vec(),
      )?
    };
    sw_frame.copy_props(hw_frame);
    Ok(sw_frame)
  }

  /// Device this pool belongs to
  pub fn device(&self) -> &HwDeviceContext {
    &self.inner.device
  }

  /// Get the software pixel format (CPU frame format)
  #[inline]
  pub fn sw_format(&self) -> PixelFormat {
    self.inner.sw_format
  }

  /// Get the hardware pixel format (GPU frame format)
  #[inline]
  pub fn hw_format(&self) -> PixelFormat {
    self.inner.hw_format
  }

  /// Get frame width
  #[inline]
  pub fn width(&self) -> u32 {
    self.inner.width
  }

  /// Get frame height
  #[inline]
  pub fn height(&self) -> u32 {
    self.inner.height
  }

  /// Number of live references to this frames context
  pub fn ref_count(&self) -> usize {
    Arc::strong_count(&self.inner)
  }

  pub fn same_context(&self, other: &HwFrameContext) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl std::fmt::Debug for HwFrameContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HwFrameContext")
      .field("device_type", &self.inner.device.device_type())
      .field("sw_format", &self.inner.sw_format)
      .field("hw_format", &self.inner.hw_format)
      .field("width", &self.inner.width)
      .field("height", &self.inner.height)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::HwDeviceType;

  fn cuda() -> HwDeviceContext {
    HwDeviceContext::new(HwDeviceType::Cuda, None).unwrap()
  }

  #[test]
  fn test_hwframe_config_default() {
    let config = HwFrameConfig::default();
    assert_eq!(config.width, 1920);
    assert_eq!(config.height, 1080);
    assert_eq!(config.sw_format, PixelFormat::Nv12);
    assert_eq!(config.pool_size, 20);
  }

  #[test]
  fn test_frames_context_holds_device_reference() {
    let device = cuda();
    let frames = HwFrameContext::new(&device, HwFrameConfig::default()).unwrap();
    assert_eq!(frames.hw_format(), PixelFormat::Cuda);
    assert_eq!(device.ref_count(), 2);
    drop(frames);
    assert_eq!(device.ref_count(), 1);
  }

  #[test]
  fn test_rejects_software_hw_format() {
    let config = HwFrameConfig {
      hw_format: Some(PixelFormat::Yuv420p),
      ..Default::default()
    };
    assert!(HwFrameContext::new(&cuda(), config).is_err());
  }

  #[test]
  fn test_fixed_pool_exhaustion() {
    let config = HwFrameConfig {
      width: 16,
      height: 16,
      pool_size: 2,
      ..Default::default()
    };
    let frames = HwFrameContext::new(&cuda(), config).unwrap();
    let a = frames.allocate_frame().unwrap();
    let _b = frames.allocate_frame().unwrap();
    assert!(matches!(
      frames.allocate_frame(),
      Err(CodecError::ResourceExhausted(_))
    ));
    assert_eq!(frames.surfaces_in_use(), 2);
    drop(a);
    assert_eq!(frames.surfaces_in_use(), 1);
    assert!(frames.allocate_frame().is_ok());
  }

  #[test]
  fn test_upload_download_round_trip() {
    let config = HwFrameConfig {
      width: 2,
      height: 2,
      sw_format: PixelFormat::Gray8,
      pool_size: 0,
      ..Default::default()
    };
    let frames = HwFrameContext::new(&cuda(), config).unwrap();
    let mut sw = Frame::from_video_data(2, 2, PixelFormat::Gray8, vec![1, 2, 3, 4]).unwrap();
    sw.set_pts(42);

    let hw = frames.upload_frame(&sw).unwrap();
    assert!(hw.is_hardware());
    assert_eq!(hw.pts(), 42);

    let back = frames.download_frame(&hw).unwrap();
    assert_eq!(back.data(), &[1, 2, 3, 4]);
    assert_eq!(back.format(), PixelFormat::Gray8);
  }
}
