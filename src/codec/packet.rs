//! Encoded data unit
//!
//! Payload bytes are reference-counted: cloning a packet adds a reference to
//! the same buffer instead of copying it.

use std::sync::Arc;

use crate::engine::NOPTS_VALUE;

use super::{CodecError, CodecResult};

/// Packet flags
pub mod pkt_flag {
  pub const KEY: i32 = 0x0001;
  pub const CORRUPT: i32 = 0x0002;
  pub const DISCARD: i32 = 0x0004;
  pub const TRUSTED: i32 = 0x0008;
  pub const DISPOSABLE: i32 = 0x0010;
}

/// In-band side data carried next to the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketSideData {
  /// Stream parameters change starting with this packet
  ParamChange { width: u32, height: u32 },
  /// Replacement codec extradata
  NewExtradata(Vec<u8>),
}

/// One chunk of encoded bitstream data
#[derive(Clone)]
pub struct Packet {
  data: Option<Arc<[u8]>>,
  pts: i64,
  dts: i64,
  duration: i64,
  flags: i32,
  stream_index: i32,
  side_data: Vec<PacketSideData>,
}

impl Default for Packet {
  fn default() -> Self {
    Self::new()
  }
}

impl Packet {
  /// Allocate a new empty packet
  pub fn new() -> Self {
    Self {
      data: None,
      pts: NOPTS_VALUE,
      dts: NOPTS_VALUE,
      duration: 0,
      flags: 0,
      stream_index: 0,
      side_data: Vec::new(),
    }
  }

  /// Create a packet owning a copy of `data`
  pub fn from_slice(data: &[u8]) -> CodecResult<Self> {
    let mut buf = Vec::new();
    buf
      .try_reserve_exact(data.len())
      .map_err(|_| CodecError::ResourceExhausted("packet buffer".into()))?;
    buf.extend_from_slice(data);
    Ok(Self::from_vec(buf))
  }

  /// Create a packet taking ownership of `data`
  pub fn from_vec(data: Vec<u8>) -> Self {
    let mut pkt = Self::new();
    if !data.is_empty() {
      pkt.data = Some(Arc::from(data));
    }
    pkt
  }

  // ========================================================================
  // Data Access
  // ========================================================================

  /// Get packet data as a slice
  pub fn as_slice(&self) -> &[u8] {
    self.data.as_deref().unwrap_or(&[])
  }

  /// Get packet size in bytes
  #[inline]
  pub fn size(&self) -> usize {
    self.as_slice().len()
  }

  /// Check if packet has data
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.size() == 0
  }

  /// An empty packet without side data signals end of stream
  #[inline]
  pub fn is_flush_marker(&self) -> bool {
    self.is_empty() && self.side_data.is_empty()
  }

  /// Number of holders of the payload buffer (0 without payload)
  pub fn ref_count(&self) -> usize {
    self.data.as_ref().map(Arc::strong_count).unwrap_or(0)
  }

  /// Copy packet data to a new Vec
  pub fn to_vec(&self) -> Vec<u8> {
    self.as_slice().to_vec()
  }

  // ========================================================================
  // Timestamps
  // ========================================================================

  /// Get presentation timestamp
  #[inline]
  pub fn pts(&self) -> i64 {
    self.pts
  }

  /// Set presentation timestamp
  #[inline]
  pub fn set_pts(&mut self, pts: i64) {
    self.pts = pts;
  }

  /// Get decoding timestamp
  #[inline]
  pub fn dts(&self) -> i64 {
    self.dts
  }

  /// Set decoding timestamp
  #[inline]
  pub fn set_dts(&mut self, dts: i64) {
    self.dts = dts;
  }

  /// Get duration
  #[inline]
  pub fn duration(&self) -> i64 {
    self.duration
  }

  /// Set duration
  #[inline]
  pub fn set_duration(&mut self, duration: i64) {
    self.duration = duration;
  }

  #[inline]
  pub fn stream_index(&self) -> i32 {
    self.stream_index
  }

  #[inline]
  pub fn set_stream_index(&mut self, index: i32) {
    self.stream_index = index;
  }

  // ========================================================================
  // Flags
  // ========================================================================

  /// Get packet flags
  #[inline]
  pub fn flags(&self) -> i32 {
    self.flags
  }

  /// Set packet flags
  #[inline]
  pub fn set_flags(&mut self, flags: i32) {
    self.flags = flags;
  }

  /// Check if this is a key frame packet
  #[inline]
  pub fn is_key(&self) -> bool {
    (self.flags & pkt_flag::KEY) != 0
  }

  /// Mark or unmark as key frame
  pub fn set_key(&mut self, key: bool) {
    if key {
      self.flags |= pkt_flag::KEY;
    } else {
      self.flags &= !pkt_flag::KEY;
    }
  }

  /// Check if packet is corrupted
  #[inline]
  pub fn is_corrupt(&self) -> bool {
    (self.flags & pkt_flag::CORRUPT) != 0
  }

  // ========================================================================
  // Side Data
  // ========================================================================

  pub fn side_data(&self) -> &[PacketSideData] {
    &self.side_data
  }

  pub fn add_side_data(&mut self, side_data: PacketSideData) {
    self.side_data.push(side_data);
  }

  /// Dimensions announced by a parameter-change entry, if any
  pub fn param_change(&self) -> Option<(u32, u32)> {
    self.side_data.iter().find_map(|sd| match sd {
      PacketSideData::ParamChange { width, height } => Some((*width, *height)),
      _ => None,
    })
  }

  // ========================================================================
  // Lifecycle
  // ========================================================================

  /// Drop the payload reference and reset fields to defaults
  pub fn unref(&mut self) {
    *self = Self::new();
  }
}

impl std::fmt::Debug for Packet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Packet")
      .field("size", &self.size())
      .field("pts", &self.pts())
      .field("dts", &self.dts())
      .field("is_key", &self.is_key())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_packet_allocation() {
    let pkt = Packet::new();
    assert!(pkt.is_empty());
    assert!(pkt.is_flush_marker());
    assert_eq!(pkt.size(), 0);
    assert_eq!(pkt.pts(), NOPTS_VALUE);
  }

  #[test]
  fn test_clone_shares_payload() {
    let pkt = Packet::from_slice(&[1, 2, 3]).unwrap();
    assert_eq!(pkt.ref_count(), 1);
    let other = pkt.clone();
    assert_eq!(pkt.ref_count(), 2);
    drop(other);
    assert_eq!(pkt.ref_count(), 1);
  }

  #[test]
  fn test_side_data_is_not_flush_marker() {
    let mut pkt = Packet::new();
    pkt.add_side_data(PacketSideData::ParamChange {
      width: 64,
      height: 48,
    });
    assert!(pkt.is_empty());
    assert!(!pkt.is_flush_marker());
    assert_eq!(pkt.param_change(), Some((64, 48)));
  }

  #[test]
  fn test_key_flag() {
    let mut pkt = Packet::from_vec(vec![0; 4]);
    pkt.set_key(true);
    assert!(pkt.is_key());
    pkt.set_key(false);
    assert!(!pkt.is_key());
  }
}
