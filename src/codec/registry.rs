//! Codec registry
//!
//! Maps kind tags reported by the store to their codecs. The registry is
//! built explicitly and handed to both the snapshot reader and the restore
//! writer; it holds no global state.

use super::{Codec, HashCodec, ListCodec, SetCodec, StringCodec, ZSetCodec};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of all supported value kinds
pub struct CodecRegistry {
    codecs: HashMap<&'static str, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// Create a registry holding the five built-in codecs
    pub fn new() -> Self {
        let mut registry = CodecRegistry::empty();

        registry.register(Arc::new(StringCodec));
        registry.register(Arc::new(ListCodec));
        registry.register(Arc::new(SetCodec));
        registry.register(Arc::new(ZSetCodec));
        registry.register(Arc::new(HashCodec));

        registry
    }

    /// Create a registry with no codecs
    pub fn empty() -> Self {
        CodecRegistry {
            codecs: HashMap::new(),
        }
    }

    /// Register a codec, replacing any codec of the same kind
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.kind().tag(), codec);
    }

    /// Get the codec for a kind tag
    pub fn get(&self, tag: &str) -> Result<Arc<dyn Codec>> {
        self.codecs
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::UnknownType(tag.to_string()))
    }

    /// Check if a kind tag is supported
    pub fn supports(&self, tag: &str) -> bool {
        self.codecs.contains_key(tag)
    }

    /// All supported kind tags
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.codecs.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
