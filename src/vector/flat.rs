//! Exhaustive cosine-similarity scan over every stored vector.

use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::vector::{cosine_similarity, ScoredId, VectorId, VectorIndex};

struct Entry {
    id: VectorId,
    vector: Vec<f32>,
}

pub struct FlatIndex {
    dims: usize,
    entries: RwLock<Vec<Entry>>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn insert(&self, id: VectorId, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dims {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        let mut entries = self.entries.write().unwrap();
        entries.retain(|e| e.id != id);
        entries.push(Entry { id, vector });
        Ok(())
    }

    fn delete(&self, id: &VectorId) -> Result<()> {
        self.entries.write().unwrap().retain(|e| &e.id != id);
        Ok(())
    }

    fn update(&self, id: VectorId, vector: Vec<f32>) -> Result<()> {
        self.insert(id, vector)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        let entries = self.entries.read().unwrap();
        let mut scored: Vec<ScoredId> = entries
            .iter()
            .map(|e| (e.id.clone(), cosine_similarity(query, &e.vector)))
            .collect();
        // Descending by score, ties broken by ascending id.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}
