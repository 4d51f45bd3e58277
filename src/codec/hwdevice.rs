//! Shared handle to a hardware device context
//!
//! The device itself is owned by the hardware context provider. A handle is
//! one reference; cloning adds a reference and dropping releases it. The
//! device lives as long as its longest holder.

use std::sync::Arc;

use crate::engine::{HwDeviceType, PixelFormat};

use super::{CodecError, CodecResult};

struct HwDeviceInner {
  device_type: HwDeviceType,
  device: Option<String>,
}

/// Reference-counted hardware device handle
#[derive(Clone)]
pub struct HwDeviceContext {
  inner: Arc<HwDeviceInner>,
}

impl HwDeviceContext {
  /// Create a new hardware device context
  ///
  /// `device` selects a specific adapter or node (e.g. `/dev/dri/renderD128`),
  /// `None` uses the provider default.
  pub fn new(device_type: HwDeviceType, device: Option<&str>) -> CodecResult<Self> {
    if device_type == HwDeviceType::None {
      return Err(CodecError::HardwareError(
        "cannot create a device context of type none".into(),
      ));
    }
    tracing::debug!(target: "codec_session", device_type = %device_type, ?device, "hardware device context created");
    Ok(Self {
      inner: Arc::new(HwDeviceInner {
        device_type,
        device: device.map(str::to_string),
      }),
    })
  }

  /// Get the device type
  #[inline]
  pub fn device_type(&self) -> HwDeviceType {
    self.inner.device_type
  }

  /// Get device type name
  pub fn device_name(&self) -> &'static str {
    self.inner.device_type.name()
  }

  /// Adapter or node this context was opened on
  pub fn device(&self) -> Option<&str> {
    self.inner.device.as_deref()
  }

  /// Hardware pixel format surfaces of this device use
  pub fn pixel_format(&self) -> PixelFormat {
    self.inner.device_type.pixel_format()
  }

  /// Number of live references to the device
  pub fn ref_count(&self) -> usize {
    Arc::strong_count(&self.inner)
  }

  /// Whether two handles refer to the same device context
  pub fn same_device(&self, other: &HwDeviceContext) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl std::fmt::Debug for HwDeviceContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HwDeviceContext")
      .field("type", &self.inner.device_type)
      .field("name", &self.device_name())
      .field("device", &self.inner.device)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reference_counting() {
    let device = HwDeviceContext::new(HwDeviceType::Cuda, None).unwrap();
    assert_eq!(device.ref_count(), 1);
    let other = device.clone();
    assert_eq!(device.ref_count(), 2);
    assert!(device.same_device(&other));
    drop(other);
    assert_eq!(device.ref_count(), 1);
  }

  #[test]
  fn test_device_none_rejected() {
    assert!(HwDeviceContext::new(HwDeviceType::None, None).is_err());
  }

  #[test]
  fn test_names() {
    let device = HwDeviceContext::new(HwDeviceType::Vaapi, Some("/dev/dri/renderD128")).unwrap();
    assert_eq!(device.device_name(), "vaapi");
    assert_eq!(device.device(), Some("/dev/dri/renderD128"));
    assert_eq!(device.pixel_format(), PixelFormat::Vaapi);
  }
}
