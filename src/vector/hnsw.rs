//! A hand-rolled Hierarchical Navigable Small World index.
//!
//! Nodes live in an arena keyed by a stable internal `u64` id (never a
//! pointer), so the graph's cyclic adjacency never needs to cross a lock
//! boundary as anything but an id lookup.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::vector::{cosine_similarity, ScoredId, VectorId, VectorIndex};

/// Construction/query parameters. `m_max0` defaults to `2 * m` per the
/// usual HNSW recommendation.
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    pub m: usize,
    pub m_max0: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub seed: u64,
    pub dims: usize,
}

impl HnswParams {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize, seed: u64, dims: usize) -> Self {
        Self {
            m,
            m_max0: 2 * m,
            ef_construction,
            ef_search,
            seed,
            dims,
        }
    }
}

struct Node {
    vector: Vec<f32>,
    level: usize,
    neighbors: Vec<Vec<u64>>,
}

struct State {
    nodes: HashMap<u64, Node>,
    id_to_internal: HashMap<VectorId, u64>,
    internal_to_id: HashMap<u64, VectorId>,
    entry_point: Option<u64>,
    max_level: usize,
    next_internal_id: u64,
    rng: StdRng,
}

pub struct HNSWIndex {
    params: HnswParams,
    state: RwLock<State>,
}

impl HNSWIndex {
    pub fn new(params: HnswParams) -> Self {
        Self {
            params,
            state: RwLock::new(State {
                nodes: HashMap::new(),
                id_to_internal: HashMap::new(),
                internal_to_id: HashMap::new(),
                entry_point: None,
                max_level: 0,
                next_internal_id: 0,
                rng: StdRng::seed_from_u64(params.seed),
            }),
        }
    }

    fn assign_level(rng: &mut StdRng, m: usize) -> usize {
        let u: f64 = rng.gen_range(f64::EPSILON..=1.0);
        let m = m.max(2) as f64;
        (-u.ln() / m.ln()).floor() as usize
    }

    fn dist(state: &State, a: u64, query: &[f32]) -> f32 {
        cosine_similarity(&state.nodes[&a].vector, query)
    }

    /// Greedy single-path descent: move to the neighbor most similar to
    /// `query` at `layer`, repeating until no neighbor improves on the
    /// current node.
    fn greedy_descend(state: &State, mut current: u64, query: &[f32], layer: usize) -> u64 {
        loop {
            let mut best = current;
            let mut best_sim = Self::dist(state, current, query);
            if let Some(node) = state.nodes.get(&current) {
                if let Some(neighbors) = node.neighbors.get(layer) {
                    for &n in neighbors {
                        let sim = Self::dist(state, n, query);
                        if sim > best_sim {
                            best = n;
                            best_sim = sim;
                        }
                    }
                }
            }
            if best == current {
                return current;
            }
            current = best;
        }
    }

    /// Beam search at `layer` starting from `entry`, returning up to `ef`
    /// candidates sorted by descending similarity.
    fn search_layer(state: &State, entry: u64, query: &[f32], layer: usize, ef: usize) -> Vec<(u64, f32)> {
        let mut visited = HashSet::new();
        visited.insert(entry);
        let entry_sim = Self::dist(state, entry, query);
        let mut candidates: Vec<(u64, f32)> = vec![(entry, entry_sim)];
        let mut results: Vec<(u64, f32)> = vec![(entry, entry_sim)];

        while let Some(&(current, current_sim)) = candidates
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        {
            candidates.retain(|&(id, _)| id != current);
            let worst_result = results
                .iter()
                .map(|&(_, s)| s)
                .fold(f32::INFINITY, f32::min);
            if results.len() >= ef && current_sim < worst_result {
                break;
            }
            if let Some(node) = state.nodes.get(&current) {
                if let Some(neighbors) = node.neighbors.get(layer) {
                    for &n in neighbors {
                        if visited.insert(n) {
                            let sim = Self::dist(state, n, query);
                            candidates.push((n, sim));
                            results.push((n, sim));
                        }
                    }
                }
            }
            results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
            results.truncate(ef);
        }
        results
    }

    /// Prefers diverse directions: a candidate is kept only if it is
    /// closer to the query than to every neighbor already selected;
    /// remaining slots (if the diversity rule leaves fewer than `cap`) are
    /// filled by the closest leftovers.
    fn select_neighbors(state: &State, query: &[f32], candidates: Vec<(u64, f32)>, cap: usize) -> Vec<u64> {
        let mut sorted = candidates;
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let mut selected: Vec<u64> = Vec::new();
        let mut leftovers = Vec::new();
        for &(candidate, sim_to_query) in &sorted {
            if selected.len() >= cap {
                break;
            }
            let diverse = selected
                .iter()
                .all(|&s| cosine_similarity(&state.nodes[&candidate].vector, &state.nodes[&s].vector) < sim_to_query);
            if diverse {
                selected.push(candidate);
            } else {
                leftovers.push(candidate);
            }
        }
        for candidate in leftovers {
            if selected.len() >= cap {
                break;
            }
            if !selected.contains(&candidate) {
                selected.push(candidate);
            }
        }
        selected
    }

    fn cap_for_layer(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m_max0
        } else {
            self.params.m
        }
    }

    fn insert_at_level(&self, state: &mut State, internal_id: u64, vector: Vec<f32>, level: usize) {
        let query = vector.clone();
        state.nodes.insert(
            internal_id,
            Node {
                vector,
                level,
                neighbors: vec![Vec::new(); level + 1],
            },
        );

        let Some(entry_point) = state.entry_point else {
            state.entry_point = Some(internal_id);
            state.max_level = level;
            return;
        };

        let mut current = entry_point;
        for layer in (level + 1..=state.max_level).rev() {
            current = Self::greedy_descend(state, current, &query, layer);
        }

        for layer in (0..=level.min(state.max_level)).rev() {
            let candidates = Self::search_layer(state, current, &query, layer, self.params.ef_construction);
            let cap = self.cap_for_layer(layer);
            let chosen = Self::select_neighbors(state, &query, candidates, cap);

            for &neighbor in &chosen {
                state.nodes.get_mut(&internal_id).unwrap().neighbors[layer].push(neighbor);
                let neighbor_node = state.nodes.get_mut(&neighbor).unwrap();
                neighbor_node.neighbors[layer].push(internal_id);
                if neighbor_node.neighbors[layer].len() > cap {
                    let neighbor_vector = neighbor_node.vector.clone();
                    let neighbor_candidates: Vec<(u64, f32)> = neighbor_node.neighbors[layer]
                        .iter()
                        .map(|&id| (id, cosine_similarity(&state.nodes[&id].vector, &neighbor_vector)))
                        .collect();
                    let trimmed = Self::select_neighbors(state, &neighbor_vector, neighbor_candidates, cap);
                    state.nodes.get_mut(&neighbor).unwrap().neighbors[layer] = trimmed;
                }
            }
            if let Some(&best) = chosen.first() {
                current = best;
            }
        }

        if level > state.max_level {
            state.entry_point = Some(internal_id);
            state.max_level = level;
        }
    }

    fn promote_entry_point(state: &mut State) {
        state.entry_point = state
            .nodes
            .iter()
            .max_by_key(|(_, node)| node.level)
            .map(|(&id, _)| id);
        state.max_level = state
            .entry_point
            .map(|id| state.nodes[&id].level)
            .unwrap_or(0);
    }

    /// Every id reachable from the entry point by following neighbor edges
    /// at any layer, via graph traversal rather than a similarity search —
    /// used to check the graph never fragments after deletes.
    #[cfg(test)]
    fn reachable_ids(&self) -> HashSet<VectorId> {
        let state = self.state.read().unwrap();
        let mut reachable = HashSet::new();
        let Some(entry) = state.entry_point else {
            return reachable;
        };
        let mut visited = HashSet::new();
        let mut stack = vec![entry];
        visited.insert(entry);
        while let Some(current) = stack.pop() {
            reachable.insert(state.internal_to_id[&current].clone());
            if let Some(node) = state.nodes.get(&current) {
                for neighbors in &node.neighbors {
                    for &n in neighbors {
                        if visited.insert(n) {
                            stack.push(n);
                        }
                    }
                }
            }
        }
        reachable
    }
}

impl VectorIndex for HNSWIndex {
    #[instrument(skip(self, vector))]
    fn insert(&self, id: VectorId, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.params.dims {
            return Err(Error::DimensionMismatch {
                expected: self.params.dims,
                actual: vector.len(),
            });
        }
        let mut state = self.state.write().unwrap();
        if state.id_to_internal.contains_key(&id) {
            drop(state);
            return self.update(id, vector);
        }
        let internal_id = state.next_internal_id;
        state.next_internal_id += 1;
        let level = Self::assign_level(&mut state.rng, self.params.m);
        state.id_to_internal.insert(id.clone(), internal_id);
        state.internal_to_id.insert(internal_id, id);
        self.insert_at_level(&mut state, internal_id, vector, level);
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete(&self, id: &VectorId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let Some(&internal_id) = state.id_to_internal.get(id) else {
            return Ok(());
        };
        let node = state.nodes.remove(&internal_id).unwrap();
        state.id_to_internal.remove(id);
        state.internal_to_id.remove(&internal_id);

        let mut orphaned: HashSet<(u64, usize)> = HashSet::new();
        for (layer, neighbors) in node.neighbors.iter().enumerate() {
            for &n in neighbors {
                if let Some(n_node) = state.nodes.get_mut(&n) {
                    n_node.neighbors[layer].retain(|&x| x != internal_id);
                    orphaned.insert((n, layer));
                }
            }
        }

        let was_entry_point = state.entry_point == Some(internal_id);
        if was_entry_point {
            Self::promote_entry_point(&mut state);
        }

        if let Some(new_entry) = state.entry_point {
            for (orphan, layer) in orphaned {
                let cap = self.cap_for_layer(layer);
                if state.nodes[&orphan].neighbors[layer].len() >= cap {
                    continue;
                }
                let query = state.nodes[&orphan].vector.clone();
                let candidates = Self::search_layer(&state, new_entry, &query, layer, cap.max(1))
                    .into_iter()
                    .filter(|&(id, _)| id != orphan)
                    .collect();
                let chosen = Self::select_neighbors(&state, &query, candidates, cap);
                for neighbor in chosen {
                    if neighbor == orphan {
                        continue;
                    }
                    let orphan_neighbors = &mut state.nodes.get_mut(&orphan).unwrap().neighbors[layer];
                    if !orphan_neighbors.contains(&neighbor) {
                        orphan_neighbors.push(neighbor);
                    }
                    let neighbor_neighbors = &mut state.nodes.get_mut(&neighbor).unwrap().neighbors[layer];
                    if !neighbor_neighbors.contains(&orphan) && neighbor_neighbors.len() < cap {
                        neighbor_neighbors.push(orphan);
                    }
                }
            }
        }
        Ok(())
    }

    #[instrument(skip(self, vector))]
    fn update(&self, id: VectorId, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.params.dims {
            return Err(Error::DimensionMismatch {
                expected: self.params.dims,
                actual: vector.len(),
            });
        }
        let level = {
            let state = self.state.read().unwrap();
            state
                .id_to_internal
                .get(&id)
                .map(|&internal| state.nodes[&internal].level)
        };
        self.delete(&id)?;
        let mut state = self.state.write().unwrap();
        let internal_id = state.next_internal_id;
        state.next_internal_id += 1;
        let level = level.unwrap_or_else(|| Self::assign_level(&mut state.rng, self.params.m));
        state.id_to_internal.insert(id.clone(), internal_id);
        state.internal_to_id.insert(internal_id, id);
        self.insert_at_level(&mut state, internal_id, vector, level);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        let state = self.state.read().unwrap();
        let Some(entry_point) = state.entry_point else {
            return Ok(Vec::new());
        };
        let mut current = entry_point;
        for layer in (1..=state.max_level).rev() {
            current = Self::greedy_descend(&state, current, query, layer);
        }
        let ef = self.params.ef_search.max(k);
        let results = Self::search_layer(&state, current, query, 0, ef);
        let mut scored: Vec<ScoredId> = results
            .into_iter()
            .map(|(internal, sim)| (state.internal_to_id[&internal].clone(), sim))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    fn dimensions(&self) -> usize {
        self.params.dims
    }

    fn len(&self) -> usize {
        self.state.read().unwrap().nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(dims: usize) -> HNSWIndex {
        HNSWIndex::new(HnswParams::new(8, 32, 32, 42, dims))
    }

    fn unit(i: usize, dims: usize) -> Vec<f32> {
        let mut v = vec![0.0; dims];
        v[i % dims] = 1.0;
        v
    }

    #[test]
    fn insert_then_search_finds_self() {
        let idx = index(4);
        for i in 0..4 {
            idx.insert(VectorId::raw(format!("v{i}").into_bytes()), unit(i, 4)).unwrap();
        }
        let results = idx.search(&unit(0, 4), 1).unwrap();
        assert_eq!(results[0].0, VectorId::raw(b"v0".to_vec()));
        assert!(results[0].1 > 0.99);
    }

    #[test]
    fn delete_removes_node_and_search_excludes_it() {
        let idx = index(4);
        for i in 0..20 {
            idx.insert(VectorId::raw(format!("v{i}").into_bytes()), unit(i, 4)).unwrap();
        }
        idx.delete(&VectorId::raw(b"v0".to_vec())).unwrap();
        let results = idx.search(&unit(0, 4), 20).unwrap();
        assert!(!results.iter().any(|(id, _)| id == &VectorId::raw(b"v0".to_vec())));
        assert_eq!(idx.len(), 19);
    }

    #[test]
    fn deleting_most_nodes_keeps_remaining_ones_searchable() {
        let idx = index(6);
        for i in 0..100 {
            let mut v = vec![0.0; 6];
            v[i % 6] = 1.0;
            v[(i + 1) % 6] = 0.3;
            idx.insert(VectorId::raw(format!("v{i}").into_bytes()), v).unwrap();
        }
        for i in 0..40 {
            idx.delete(&VectorId::raw(format!("v{i}").into_bytes())).unwrap();
        }
        assert_eq!(idx.len(), 60);
        let results = idx.search(&unit(50, 6), 10).unwrap();
        assert_eq!(results.len(), 10);
        for (id, _) in &results {
            let n: usize = std::str::from_utf8(&id.as_bytes()[0..])
                .unwrap()
                .trim_start_matches('v')
                .parse()
                .unwrap();
            assert!(n >= 40);
        }
    }

    #[test]
    fn after_deleting_a_third_of_nodes_every_survivor_is_reachable_from_the_entry_point() {
        let idx = index(6);
        for i in 0..90 {
            let mut v = vec![0.0; 6];
            v[i % 6] = 1.0;
            v[(i + 1) % 6] = 0.3;
            idx.insert(VectorId::raw(format!("v{i}").into_bytes()), v).unwrap();
        }
        for i in 0..30 {
            idx.delete(&VectorId::raw(format!("v{i}").into_bytes())).unwrap();
        }
        let expected = idx.len();
        let reachable = idx.reachable_ids();
        assert_eq!(reachable.len(), expected, "graph traversal from the entry point missed some survivors");
        let state = idx.state.read().unwrap();
        for id in state.internal_to_id.values() {
            assert!(reachable.contains(id), "{id:?} is unreachable from the entry point after deletes");
        }
    }

    /// Brute-force ground truth over 10k random points, checked against the
    /// index's own top-k at M=16/ef_search=50. Recall below 0.9 on this seed
    /// would mean the construction/search parameters can't meet the
    /// accuracy bar they're meant to.
    #[test]
    fn recall_at_10k_points_meets_point_nine_at_m16_ef_search_50() {
        const N: usize = 10_000;
        const DIMS: usize = 16;
        const K: usize = 10;

        let mut rng = StdRng::seed_from_u64(1234);
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(N);
        for _ in 0..N {
            let mut v: Vec<f32> = (0..DIMS).map(|_| rng.gen_range(-1.0..1.0)).collect();
            crate::vector::normalize(&mut v);
            vectors.push(v);
        }

        let idx = HNSWIndex::new(HnswParams::new(16, 64, 50, 7, DIMS));
        for (i, v) in vectors.iter().enumerate() {
            idx.insert(VectorId::raw(format!("v{i}").into_bytes()), v.clone()).unwrap();
        }

        let queries: Vec<usize> = (0..50).map(|i| i * (N / 50)).collect();
        let mut total_overlap = 0usize;
        for &qi in &queries {
            let query = &vectors[qi];

            let mut truth: Vec<(usize, f32)> = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (i, cosine_similarity(v, query)))
                .collect();
            truth.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
            let truth_ids: HashSet<String> = truth[..K].iter().map(|&(i, _)| format!("v{i}")).collect();

            let found = idx.search(query, K).unwrap();
            let overlap = found
                .iter()
                .filter(|(id, _)| truth_ids.contains(std::str::from_utf8(id.as_bytes()).unwrap()))
                .count();
            total_overlap += overlap;
        }

        let recall = total_overlap as f64 / (queries.len() * K) as f64;
        assert!(recall >= 0.9, "recall {recall} below 0.9 over {} queries", queries.len());
    }

    #[test]
    fn update_replaces_vector() {
        let idx = index(2);
        idx.insert(VectorId::raw(b"a".to_vec()), vec![1.0, 0.0]).unwrap();
        idx.update(VectorId::raw(b"a".to_vec()), vec![0.0, 1.0]).unwrap();
        let results = idx.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(results[0].0, VectorId::raw(b"a".to_vec()));
        assert!(results[0].1 > 0.99);
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let idx = index(3);
        assert!(idx.insert(VectorId::raw(b"a".to_vec()), vec![1.0, 0.0]).is_err());
    }
}
