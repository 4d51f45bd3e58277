//! Codec registry
//!
//! Maps codec ids to descriptors and engine factories. The process-wide
//! registry starts with the built-in reference codecs; external engines are
//! added with [`register_engine`]. Later registrations take precedence.

use std::sync::{Arc, LazyLock, RwLock};

use crate::codec::{CodecError, CodecResult, CodecType};

use super::{raw, CodecDescriptor, CodecEngine, CodecId, EngineResult};

/// Creates an engine instance for a role
pub type EngineFactory =
  Arc<dyn Fn(CodecType) -> EngineResult<Box<dyn CodecEngine>> + Send + Sync>;

#[derive(Clone)]
struct RegistryEntry {
  descriptor: &'static CodecDescriptor,
  factory: EngineFactory,
}

/// Set of known codecs
#[derive(Clone, Default)]
pub struct CodecRegistry {
  entries: Vec<RegistryEntry>,
}

impl CodecRegistry {
  /// Empty registry
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry with the reference codecs
  pub fn with_builtin() -> Self {
    let mut registry = Self::new();
    for &descriptor in raw::DESCRIPTORS {
      registry.register(descriptor, move |role| raw::RawCodec::create(descriptor, role));
    }
    registry
  }

  /// Add a codec; it shadows earlier entries with the same id
  pub fn register<F>(&mut self, descriptor: &'static CodecDescriptor, factory: F)
  where
    F: Fn(CodecType) -> EngineResult<Box<dyn CodecEngine>> + Send + Sync + 'static,
  {
    tracing::debug!(target: "codec_session", codec = descriptor.name, "codec registered");
    self.entries.insert(
      0,
      RegistryEntry {
        descriptor,
        factory: Arc::new(factory),
      },
    );
  }

  fn find_entry(&self, id: CodecId, role: CodecType) -> Option<&RegistryEntry> {
    self
      .entries
      .iter()
      .find(|e| e.descriptor.id == id && e.descriptor.supports(role))
  }

  /// Descriptor of the preferred implementation of `id` for `role`
  pub fn find(&self, id: CodecId, role: CodecType) -> Option<&'static CodecDescriptor> {
    self.find_entry(id, role).map(|e| e.descriptor)
  }

  pub fn find_by_name(&self, name: &str, role: CodecType) -> Option<&'static CodecDescriptor> {
    self
      .entries
      .iter()
      .find(|e| e.descriptor.name == name && e.descriptor.supports(role))
      .map(|e| e.descriptor)
  }

  /// All registered descriptors, most recent first
  pub fn descriptors(&self) -> impl Iterator<Item = &'static CodecDescriptor> + '_ {
    self.entries.iter().map(|e| e.descriptor)
  }

  /// Instantiate an engine
  pub fn create(&self, id: CodecId, role: CodecType) -> CodecResult<Box<dyn CodecEngine>> {
    let entry = match self.find_entry(id, role) {
      Some(entry) => entry,
      None if self.entries.iter().any(|e| e.descriptor.id == id) => {
        return Err(match role {
          CodecType::Encoder => CodecError::EncoderNotFound(id),
          CodecType::Decoder => CodecError::DecoderNotFound(id),
        })
      }
      None => return Err(CodecError::CodecNotFound(id.name().to_string())),
    };
    (entry.factory)(role).map_err(|e| {
      if e.is_oom() {
        CodecError::AllocationFailed("codec engine")
      } else {
        CodecError::Engine(e)
      }
    })
  }
}

static REGISTRY: LazyLock<RwLock<CodecRegistry>> =
  LazyLock::new(|| RwLock::new(CodecRegistry::with_builtin()));

/// Register an engine with the process-wide registry
pub fn register_engine<F>(descriptor: &'static CodecDescriptor, factory: F)
where
  F: Fn(CodecType) -> EngineResult<Box<dyn CodecEngine>> + Send + Sync + 'static,
{
  REGISTRY
    .write()
    .unwrap_or_else(|e| e.into_inner())
    .register(descriptor, factory);
}

pub fn find_descriptor(id: CodecId, role: CodecType) -> Option<&'static CodecDescriptor> {
  REGISTRY
    .read()
    .unwrap_or_else(|e| e.into_inner())
    .find(id, role)
}

pub fn find_descriptor_by_name(name: &str, role: CodecType) -> Option<&'static CodecDescriptor> {
  REGISTRY
    .read()
    .unwrap_or_else(|e| e.into_inner())
    .find_by_name(name, role)
}

pub(crate) fn create_engine(id: CodecId, role: CodecType) -> CodecResult<Box<dyn CodecEngine>> {
  REGISTRY
    .read()
    .unwrap_or_else(|e| e.into_inner())
    .create(id, role)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec::ErrorKind;
  use crate::engine::{Capabilities, EngineContext, EngineError, MediaType};

  struct Failing;

  static FAILING: CodecDescriptor = CodecDescriptor {
    id: CodecId::Opus,
    name: "opus_test",
    long_name: "always fails",
    media_type: MediaType::Audio,
    capabilities: Capabilities {
      decoder: true,
      encoder: false,
      delay: false,
      frame_threads: false,
      slice_threads: false,
      hardware: false,
    },
    pix_fmts: &[],
    sample_fmts: &[],
    options: &[],
  };

  impl CodecEngine for Failing {
    fn descriptor(&self) -> &'static CodecDescriptor {
      &FAILING
    }

    fn open(&mut self, _ctx: &mut EngineContext<'_>) -> EngineResult<()> {
      Err(EngineError::invalid_data("unsupported"))
    }

    fn flush(&mut self) {}
  }

  #[test]
  fn test_builtin_lookup() {
    let registry = CodecRegistry::with_builtin();
    let desc = registry.find(CodecId::RawVideo, CodecType::Decoder).unwrap();
    assert_eq!(desc.name, "rawvideo");
    assert!(registry.find_by_name("pcm_s16le", CodecType::Encoder).is_some());
    assert!(registry.find(CodecId::H264, CodecType::Decoder).is_none());
  }

  #[test]
  fn test_create_errors() {
    let mut registry = CodecRegistry::with_builtin();
    let err = registry.create(CodecId::H264, CodecType::Decoder).err().unwrap();
    assert!(matches!(err, CodecError::CodecNotFound(_)));

    registry.register(&FAILING, |_| Ok(Box::new(Failing)));
    let err = registry.create(CodecId::Opus, CodecType::Encoder).err().unwrap();
    assert!(matches!(err, CodecError::EncoderNotFound(CodecId::Opus)));
    assert!(registry.create(CodecId::Opus, CodecType::Decoder).is_ok());

    registry.register(&FAILING, |_| Err(EngineError::oom("engine")));
    let err = registry.create(CodecId::Opus, CodecType::Decoder).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Allocation);
  }

  #[test]
  fn test_later_registration_shadows() {
    let mut registry = CodecRegistry::new();
    registry.register(&FAILING, |_| Ok(Box::new(Failing)));
    registry.register(&raw::RAWVIDEO, |role| raw::RawCodec::create(&raw::RAWVIDEO, role));
    assert_eq!(registry.descriptors().next().unwrap().name, "rawvideo");
  }
}
