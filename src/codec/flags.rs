//! Typed flag sets for codec configuration words
//!
//! Each flag word is a set of enum members with the exact bit values of the
//! underlying configuration word. The `(flag, bit, name)` table doubles as the
//! vocabulary for option strings such as `"+global_header-low_delay"`.

use std::fmt;

macro_rules! flag_set {
  (
    $(#[$set_meta:meta])*
    $set:ident, $flag:ident {
      $( $(#[$var_meta:meta])* $variant:ident = $bit:expr => $name:literal, )+
    }
  ) => {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum $flag {
      $( $(#[$var_meta])* $variant, )+
    }

    impl $flag {
      /// Every flag with its bit value and option name
      pub const TABLE: &'static [($flag, u32, &'static str)] = &[
        $( ($flag::$variant, $bit, $name), )+
      ];

      pub fn bit(self) -> u32 {
        match self {
          $( $flag::$variant => $bit, )+
        }
      }

      pub fn name(self) -> &'static str {
        match self {
          $( $flag::$variant => $name, )+
        }
      }

      pub fn from_name(name: &str) -> Option<Self> {
        Self::TABLE.iter().find(|(_, _, n)| *n == name).map(|(f, _, _)| *f)
      }
    }

    $(#[$set_meta])*
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct $set(u32);

    impl $set {
      pub const fn empty() -> Self {
        Self(0)
      }

      /// Build a set from a raw word, dropping bits with no named flag
      pub fn from_bits_truncate(bits: u32) -> Self {
        let known = $flag::TABLE.iter().fold(0, |acc, (_, b, _)| acc | b);
        Self(bits & known)
      }

      pub fn bits(&self) -> u32 {
        self.0
      }

      pub fn is_empty(&self) -> bool {
        self.0 == 0
      }

      pub fn contains(&self, flag: $flag) -> bool {
        self.0 & flag.bit() != 0
      }

      pub fn insert(&mut self, flag: $flag) {
        self.0 |= flag.bit();
      }

      pub fn remove(&mut self, flag: $flag) {
        self.0 &= !flag.bit();
      }

      pub fn with(mut self, flag: $flag) -> Self {
        self.insert(flag);
        self
      }

      pub fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
      }

      pub fn intersection(&self, other: Self) -> Self {
        Self(self.0 & other.0)
      }

      pub fn difference(&self, other: Self) -> Self {
        Self(self.0 & !other.0)
      }

      /// Members in table order
      pub fn iter(&self) -> impl Iterator<Item = $flag> + '_ {
        $flag::TABLE
          .iter()
          .filter(move |(_, bit, _)| self.0 & bit != 0)
          .map(|(f, _, _)| *f)
      }

      /// Apply an option string relative to the current value
      ///
      /// A string starting with `+` or `-` edits the current set; otherwise
      /// the named flags replace it. Tokens are separated by `+`, `-` or `|`.
      pub fn apply_str(&self, value: &str) -> Result<Self, String> {
        let value = value.trim();
        let relative = value.starts_with('+') || value.starts_with('-');
        let mut out = if relative { *self } else { Self::empty() };
        let mut op = '+';
        let mut token = String::new();
        for ch in value.chars().chain(std::iter::once('+')) {
          if ch == '+' || ch == '-' || ch == '|' {
            if !token.is_empty() {
              let flag = $flag::from_name(&token)
                .ok_or_else(|| format!("unknown flag '{}'", token))?;
              if op == '-' {
                out.remove(flag);
              } else {
                out.insert(flag);
              }
              token.clear();
            }
            op = if ch == '|' { '+' } else { ch };
          } else if !ch.is_whitespace() {
            token.push(ch);
          }
        }
        Ok(out)
      }
    }

    impl From<$flag> for $set {
      fn from(flag: $flag) -> Self {
        Self(flag.bit())
      }
    }

    impl std::ops::BitOr for $set {
      type Output = Self;

      fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
      }
    }

    impl std::ops::BitOr<$flag> for $set {
      type Output = Self;

      fn bitor(self, rhs: $flag) -> Self {
        self.with(rhs)
      }
    }

    impl std::ops::Sub for $set {
      type Output = Self;

      fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
      }
    }

    impl FromIterator<$flag> for $set {
      fn from_iter<I: IntoIterator<Item = $flag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, f| set.with(f))
      }
    }

    impl fmt::Display for $set {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in self.iter() {
          if !first {
            f.write_str("+")?;
          }
          f.write_str(flag.name())?;
          first = false;
        }
        Ok(())
      }
    }
  };
}

flag_set! {
  /// Codec context `flags` word
  CodecFlags, CodecFlag {
    Unaligned = 1 << 0 => "unaligned",
    Qscale = 1 << 1 => "qscale",
    FourMv = 1 << 2 => "4mv",
    OutputCorrupt = 1 << 3 => "output_corrupt",
    Qpel = 1 << 4 => "qpel",
    DropChanged = 1 << 5 => "drop_changed",
    ReconFrame = 1 << 6 => "recon_frame",
    CopyOpaque = 1 << 7 => "copy_opaque",
    FrameDuration = 1 << 8 => "frame_duration",
    Pass1 = 1 << 9 => "pass1",
    Pass2 = 1 << 10 => "pass2",
    LoopFilter = 1 << 11 => "loop",
    Gray = 1 << 13 => "gray",
    Psnr = 1 << 15 => "psnr",
    InterlacedDct = 1 << 18 => "ildct",
    LowDelay = 1 << 19 => "low_delay",
    GlobalHeader = 1 << 22 => "global_header",
    BitExact = 1 << 23 => "bitexact",
    AcPred = 1 << 24 => "aic",
    InterlacedMe = 1 << 29 => "ilme",
    ClosedGop = 1 << 31 => "cgop",
  }
}

flag_set! {
  /// Codec context `flags2` word
  CodecFlags2, CodecFlag2 {
    Fast = 1 << 0 => "fast",
    NoOutput = 1 << 2 => "noout",
    LocalHeader = 1 << 3 => "local_header",
    Chunks = 1 << 15 => "chunks",
    IgnoreCrop = 1 << 16 => "ignorecrop",
    ShowAll = 1 << 22 => "showall",
    ExportMvs = 1 << 28 => "export_mvs",
    SkipManual = 1 << 29 => "skip_manual",
    RoFlushNoop = 1 << 30 => "ass_ro_flush_noop",
  }
}

flag_set! {
  /// Threading modes a codec may use
  ThreadType, ThreadMode {
    /// Decode/encode several frames at once; adds output delay
    Frame = 1 << 0 => "frame",
    /// Split one frame into slices processed in parallel
    Slice = 1 << 1 => "slice",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bit_values_match_table() {
    assert_eq!(CodecFlag::GlobalHeader.bit(), 0x0040_0000);
    assert_eq!(CodecFlag::ClosedGop.bit(), 0x8000_0000);
    assert_eq!(CodecFlag2::ExportMvs.bit(), 0x1000_0000);
    assert_eq!(ThreadMode::Slice.bit(), 2);
    for (flag, bit, name) in CodecFlag::TABLE {
      assert_eq!(flag.bit(), *bit);
      assert_eq!(CodecFlag::from_name(name), Some(*flag));
    }
  }

  #[test]
  fn test_set_operations() {
    let a = CodecFlags::from(CodecFlag::LowDelay) | CodecFlag::GlobalHeader;
    let b = CodecFlags::from(CodecFlag::GlobalHeader);
    assert!(a.contains(CodecFlag::LowDelay));
    assert_eq!(a.difference(b), CodecFlags::from(CodecFlag::LowDelay));
    assert_eq!(a.intersection(b), b);
    assert_eq!(a.bits(), (1 << 19) | (1 << 22));
    assert_eq!(a.to_string(), "low_delay+global_header");
  }

  #[test]
  fn test_from_bits_truncate_drops_unknown() {
    let set = CodecFlags::from_bits_truncate((1 << 12) | (1 << 13));
    assert_eq!(set.bits(), 1 << 13);
    assert!(set.contains(CodecFlag::Gray));
  }

  #[test]
  fn test_apply_str() {
    let base = CodecFlags::from(CodecFlag::LowDelay);
    let edited = base.apply_str("+global_header-low_delay").unwrap();
    assert_eq!(edited, CodecFlags::from(CodecFlag::GlobalHeader));

    let replaced = base.apply_str("bitexact|gray").unwrap();
    assert_eq!(replaced.iter().count(), 2);
    assert!(!replaced.contains(CodecFlag::LowDelay));

    assert!(base.apply_str("+nonsense").is_err());
    assert_eq!(ThreadType::empty().apply_str("frame+slice").unwrap().bits(), 3);
  }
}
