//! Filters graph solutions by vector similarity on a named variable —
//! the bridge between pattern matching and the vector index.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::triple::{Solution, Variable};
use crate::vector::embed::Embedder;
use crate::vector::{cosine_similarity, normalize, IdKind, VectorId, VectorStore};

/// Either an already-computed query vector or raw text to be embedded.
#[derive(Clone)]
pub enum VectorQuery {
    Vector(Vec<f32>),
    Text(String),
}

/// Narrows a set of join solutions to those whose `variable` binding is
/// similar (by cosine score) to a query vector or query text.
///
/// Carries its own [`VectorStore`] (and, for text queries, [`Embedder`])
/// handle so a [`crate::search::Search`] can apply it without any extra
/// threading through the join engine.
#[derive(Clone)]
pub struct VectorFilter {
    pub variable: Variable,
    pub query: VectorQuery,
    pub top_k: usize,
    pub min_score: f32,
    pub id_type: IdKind,
    pub store: Arc<VectorStore>,
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl VectorFilter {
    pub fn new(variable: impl Into<Variable>, query: VectorQuery, store: Arc<VectorStore>) -> Self {
        Self {
            variable: variable.into(),
            query,
            top_k: usize::MAX,
            min_score: -1.0,
            id_type: IdKind::Raw,
            store,
            embedder: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_id_type(mut self, id_type: IdKind) -> Self {
        self.id_type = id_type;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    fn resolve_query_vector(&self) -> Result<Vec<f32>> {
        let mut v = match &self.query {
            VectorQuery::Vector(v) => v.clone(),
            VectorQuery::Text(text) => {
                let embedder = self.embedder.as_ref().ok_or(Error::EmbedderRequired)?;
                embedder.embed(text)?
            }
        };
        normalize(&mut v);
        Ok(v)
    }
}

/// Runs `filter` over `solutions`, producing the score-sorted, `top_k`-
/// truncated subset at or above `min_score`. Duplicate id bindings across
/// solutions are resolved through one shared similarity computation.
pub fn apply_vector_filter(filter: &VectorFilter, solutions: Vec<Solution>) -> Result<Vec<Solution>> {
    let query_vector = filter.resolve_query_vector()?;
    let mut score_by_id: HashMap<VectorId, Option<f32>> = HashMap::new();

    let mut scored: Vec<(Solution, f32)> = Vec::with_capacity(solutions.len());
    for solution in solutions {
        let Some(bytes) = solution.get(&filter.variable) else {
            continue;
        };
        let id = filter.id_type.build(bytes);
        let score = *score_by_id.entry(id.clone()).or_insert_with(|| {
            filter
                .store
                .get_vector(&id)
                .ok()
                .flatten()
                .map(|v| cosine_similarity(&query_vector, &v))
        });
        if let Some(score) = score {
            if score >= filter.min_score {
                scored.push((solution, score));
            }
        }
    }

    // Stable sort: ties preserve the join order they arrived in.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    scored.truncate(filter.top_k);
    Ok(scored.into_iter().map(|(s, _)| s).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory_store::MemoryStore;
    use crate::triple::Solution;
    use crate::vector::flat::FlatIndex;
    use crate::vector::VectorIndex;

    fn store_with(vectors: &[(&str, Vec<f32>)]) -> Arc<VectorStore> {
        let kv: Arc<dyn crate::kv::KvStore> = Arc::new(MemoryStore::new());
        let index: Arc<dyn VectorIndex> = Arc::new(FlatIndex::new(3));
        let store = Arc::new(VectorStore::new(kv, index));
        for (id, v) in vectors {
            store.set_vector(VectorId::raw(id.as_bytes().to_vec()), v.clone()).unwrap();
        }
        store
    }

    fn solution_with(var: &str, value: &str) -> Solution {
        Solution::new().bind(var, value.as_bytes()).unwrap()
    }

    #[test]
    fn drops_solutions_below_min_score_and_sorts_descending() {
        let store = store_with(&[
            ("tennis", vec![1.0, 0.0, 0.0]),
            ("badminton", vec![1.0, 0.0, 0.0]),
            ("football", vec![0.0, 1.0, 0.0]),
        ]);
        let filter = VectorFilter::new("sport", VectorQuery::Vector(vec![1.0, 0.0, 0.0]), store)
            .with_min_score(0.7)
            .with_id_type(IdKind::Raw);
        let solutions = vec![
            solution_with("sport", "football"),
            solution_with("sport", "tennis"),
            solution_with("sport", "badminton"),
        ];
        let result = apply_vector_filter(&filter, solutions).unwrap();
        assert_eq!(result.len(), 2);
        for s in &result {
            assert_ne!(s.get("sport"), Some(&b"football"[..]));
        }
    }

    #[test]
    fn duplicate_bindings_share_the_cached_score() {
        let store = store_with(&[("tennis", vec![1.0, 0.0, 0.0])]);
        let filter = VectorFilter::new("sport", VectorQuery::Vector(vec![1.0, 0.0, 0.0]), store);
        let solutions = vec![
            solution_with("sport", "tennis").bind("who", b"alice").unwrap(),
            solution_with("sport", "tennis").bind("who", b"bob").unwrap(),
        ];
        let result = apply_vector_filter(&filter, solutions).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn top_k_truncates_after_sorting() {
        let store = store_with(&[
            ("a", vec![1.0, 0.0, 0.0]),
            ("b", vec![0.9, 0.1, 0.0]),
            ("c", vec![0.1, 0.9, 0.0]),
        ]);
        let filter = VectorFilter::new("x", VectorQuery::Vector(vec![1.0, 0.0, 0.0]), store)
            .with_min_score(-1.0)
            .with_top_k(1);
        let solutions = vec![
            solution_with("x", "c"),
            solution_with("x", "b"),
            solution_with("x", "a"),
        ];
        let result = apply_vector_filter(&filter, solutions).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].get("x"), Some(&b"a"[..]));
    }

    #[test]
    fn text_query_without_embedder_fails() {
        let store = store_with(&[("a", vec![1.0, 0.0, 0.0])]);
        let filter = VectorFilter::new("x", VectorQuery::Text("tennis".into()), store);
        let err = apply_vector_filter(&filter, vec![solution_with("x", "a")]).unwrap_err();
        assert!(matches!(err, Error::EmbedderRequired));
    }
}
