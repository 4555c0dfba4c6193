//! Database configuration used when opening an instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::vector::embed::{AutoEmbedTargets, Embedder};

/// Which vector index backs a configured `VectorStore`.
#[derive(Clone)]
pub enum VectorIndexKind {
    Flat,
    Hnsw {
        m: usize,
        ef_construction: usize,
        ef_search: usize,
        seed: u64,
    },
}

#[derive(Clone)]
pub struct VectorConfig {
    pub kind: VectorIndexKind,
    pub dimensions: usize,
}

#[derive(Clone)]
pub struct Options {
    data_path: PathBuf,
    vector: Option<VectorConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    auto_embed_targets: AutoEmbedTargets,
    embed_queue_capacity: usize,
    default_pattern_limit: Option<usize>,
}

impl Options {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            data_path: path.as_ref().to_owned(),
            vector: None,
            embedder: None,
            auto_embed_targets: AutoEmbedTargets::None,
            embed_queue_capacity: 256,
            default_pattern_limit: None,
        }
    }

    pub fn with_vector_index(mut self, kind: VectorIndexKind, dimensions: usize) -> Self {
        self.vector = Some(VectorConfig { kind, dimensions });
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_auto_embed_targets(mut self, targets: AutoEmbedTargets) -> Self {
        self.auto_embed_targets = targets;
        self
    }

    pub fn with_embed_queue_capacity(mut self, capacity: usize) -> Self {
        self.embed_queue_capacity = capacity;
        self
    }

    pub fn with_default_pattern_limit(mut self, limit: usize) -> Self {
        self.default_pattern_limit = Some(limit);
        self
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn vector(&self) -> Option<&VectorConfig> {
        self.vector.as_ref()
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    pub fn auto_embed_targets(&self) -> AutoEmbedTargets {
        self.auto_embed_targets
    }

    pub fn embed_queue_capacity(&self) -> usize {
        self.embed_queue_capacity
    }

    pub fn default_pattern_limit(&self) -> Option<usize> {
        self.default_pattern_limit
    }
}
