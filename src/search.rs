//! Multi-pattern join engine: plans a pattern sequence smallest-first, then
//! executes a nested left-deep join producing a stream of solutions.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::instrument;

use crate::context::Context;
use crate::hexastore::Hexastore;
use crate::triple::{Pattern, PatternValue, Solution, Variable};
use crate::error::Result;

/// Options governing a multi-pattern [`Search`].
#[derive(Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub offset: usize,
    pub filter: Option<Arc<dyn Fn(&Solution) -> bool + Send + Sync>>,
    pub vector_filter: Option<crate::vector::hybrid::VectorFilter>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_filter(mut self, filter: impl Fn(&Solution) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_vector_filter(mut self, filter: crate::vector::hybrid::VectorFilter) -> Self {
        self.vector_filter = Some(filter);
        self
    }
}

/// A planned, executable multi-pattern query over one [`Hexastore`].
pub struct Search {
    hexastore: Arc<Hexastore>,
    patterns: Vec<Pattern>,
    options: SearchOptions,
}

impl Search {
    pub fn new(hexastore: Arc<Hexastore>, patterns: Vec<Pattern>, options: SearchOptions) -> Self {
        Self {
            hexastore,
            patterns,
            options,
        }
    }

    /// Orders `patterns` smallest-estimated-cardinality first.
    ///
    /// A pattern that shares a variable with an already-ordered pattern is
    /// favored: once bound, its wildcard/binding slots become exact
    /// lookups and its true cardinality collapses, which is the practical
    /// form of "a pattern that introduces a variable used by a later
    /// pattern must appear first" — the introducer naturally sorts earlier
    /// because deferring it only delays the cheap, concrete lookup.
    fn plan(&self) -> Result<Vec<usize>> {
        let mut remaining: Vec<usize> = (0..self.patterns.len()).collect();
        let mut bound_vars: HashSet<Variable> = HashSet::new();
        let mut order = Vec::with_capacity(self.patterns.len());

        while !remaining.is_empty() {
            let mut best_idx = 0;
            let mut best_key = None;
            for (pos, &idx) in remaining.iter().enumerate() {
                let pattern = &self.patterns[idx];
                let overlap = pattern_variables(pattern)
                    .filter(|v| bound_vars.contains(v))
                    .count();
                let cardinality = self.hexastore.estimate_cardinality(pattern)?;
                // Lower is better: more overlap with already-bound variables
                // first, then lower estimated cardinality, then original
                // position (keeps output order deterministic).
                let key = (std::cmp::Reverse(overlap), cardinality, idx);
                if best_key.is_none() || key < *best_key.as_ref().unwrap() {
                    best_key = Some(key);
                    best_idx = pos;
                }
            }
            let chosen = remaining.remove(best_idx);
            for v in pattern_variables(&self.patterns[chosen]) {
                bound_vars.insert(v.clone());
            }
            order.push(chosen);
        }
        Ok(order)
    }

    /// Runs the join to completion and returns the resulting solutions,
    /// with the solution filter, vector filter, offset, and limit applied
    /// in that order.
    #[instrument(skip(self, ctx))]
    pub fn solutions(&self, ctx: &Context) -> Result<Vec<Solution>> {
        ctx.check()?;
        let order = self.plan()?;

        let mut branches = vec![Solution::new()];
        for &idx in &order {
            ctx.check()?;
            let pattern = &self.patterns[idx];
            let mut next_branches = Vec::new();
            for solution in &branches {
                let effective = substitute_bound(pattern, solution);
                for triple in self.hexastore.query(&effective)? {
                    if let Some(extended) = bind_triple(pattern, solution, &triple) {
                        next_branches.push(extended);
                    }
                }
            }
            branches = next_branches;
        }

        if let Some(filter) = &self.options.filter {
            branches.retain(|s| filter(s));
        }

        if let Some(vector_filter) = &self.options.vector_filter {
            branches = crate::vector::hybrid::apply_vector_filter(vector_filter, branches)?;
        }

        let offset = self.options.offset.min(branches.len());
        branches.drain(..offset);
        if let Some(limit) = self.options.limit {
            branches.truncate(limit);
        }
        Ok(branches)
    }

    /// All distinct triples that were visited while producing solutions,
    /// reconstructed from the bound patterns. Used by [`crate::Navigator`]'s
    /// `triples()` terminal.
    pub fn triples(&self, ctx: &Context) -> Result<Vec<crate::triple::Triple>> {
        let solutions = self.solutions(ctx)?;
        let mut triples = Vec::new();
        for pattern in &self.patterns {
            for solution in &solutions {
                let effective = substitute_bound(pattern, solution);
                triples.extend(self.hexastore.query(&effective)?);
            }
        }
        triples.sort();
        triples.dedup();
        Ok(triples)
    }
}

fn pattern_variables(pattern: &Pattern) -> impl Iterator<Item = &Variable> {
    [pattern.subject(), pattern.predicate(), pattern.object()]
        .into_iter()
        .filter_map(|v| match v {
            PatternValue::Binding(name) => Some(name),
            _ => None,
        })
}

/// Replaces every `Binding(name)` already bound in `solution` with an
/// `Exact` value, so the hexastore can use it for index selection.
fn substitute_bound(pattern: &Pattern, solution: &Solution) -> Pattern {
    let substitute = |value: &PatternValue| match value {
        PatternValue::Binding(name) => match solution.get(name) {
            Some(bytes) => PatternValue::Exact(bytes.to_vec()),
            None => value.clone(),
        },
        other => other.clone(),
    };
    let mut effective = Pattern::new(
        substitute(pattern.subject()),
        substitute(pattern.predicate()),
        substitute(pattern.object()),
    );
    if let Some(filter) = pattern.filter() {
        let filter = Arc::clone(filter);
        effective = effective.with_filter(move |t| filter(t));
    }
    effective
}

/// Binds every still-unbound `Binding` slot of `pattern` against `triple`'s
/// matching component, starting from `solution`. Returns `None` if any slot
/// disagrees with an existing binding (including two slots in the same
/// pattern bound to the same name but different bytes in this triple).
fn bind_triple(pattern: &Pattern, solution: &Solution, triple: &crate::triple::Triple) -> Option<Solution> {
    let mut current = solution.clone();
    for (value, bytes) in [
        (pattern.subject(), triple.subject()),
        (pattern.predicate(), triple.predicate()),
        (pattern.object(), triple.object()),
    ] {
        if let PatternValue::Binding(name) = value {
            current = current.bind(name, bytes)?;
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory_store::MemoryStore;
    use crate::triple::Triple;

    fn hexastore_with(triples: &[(&str, &str, &str)]) -> Arc<Hexastore> {
        let hex = Arc::new(Hexastore::new(Arc::new(MemoryStore::new())));
        for (s, p, o) in triples {
            hex.insert(&Triple::new(s.as_bytes().to_vec(), p.as_bytes().to_vec(), o.as_bytes().to_vec()).unwrap())
                .unwrap();
        }
        hex
    }

    #[test]
    fn single_pattern_yields_one_solution_per_match() {
        let hex = hexastore_with(&[("alice", "knows", "bob"), ("bob", "knows", "carol")]);
        let patterns = vec![Pattern::new(
            PatternValue::exact(b"alice".to_vec()),
            PatternValue::exact(b"knows".to_vec()),
            PatternValue::binding("who"),
        )];
        let search = Search::new(hex, patterns, SearchOptions::new());
        let solutions = search.solutions(&Context::background()).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("who"), Some(&b"bob"[..]));
    }

    #[test]
    fn two_pattern_join_matches_shared_variable() {
        // a knows b, b knows c, a knows c — chain query ?x knows ?y, ?y knows ?z
        let hex = hexastore_with(&[
            ("a", "k", "b"),
            ("b", "k", "c"),
            ("a", "k", "c"),
        ]);
        let patterns = vec![
            Pattern::new(
                PatternValue::binding("x"),
                PatternValue::exact(b"k".to_vec()),
                PatternValue::binding("y"),
            ),
            Pattern::new(
                PatternValue::binding("y"),
                PatternValue::exact(b"k".to_vec()),
                PatternValue::binding("z"),
            ),
        ];
        let search = Search::new(hex, patterns, SearchOptions::new());
        let mut solutions = search.solutions(&Context::background()).unwrap();
        solutions.sort_by(|a, b| a.get("x").cmp(&b.get("x")));
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("x"), Some(&b"a"[..]));
        assert_eq!(solutions[0].get("y"), Some(&b"b"[..]));
        assert_eq!(solutions[0].get("z"), Some(&b"c"[..]));
    }

    #[test]
    fn solution_filter_drops_non_matching_branches() {
        let hex = hexastore_with(&[("a", "k", "b"), ("a", "k", "c")]);
        let patterns = vec![Pattern::new(
            PatternValue::exact(b"a".to_vec()),
            PatternValue::exact(b"k".to_vec()),
            PatternValue::binding("y"),
        )];
        let options = SearchOptions::new().with_filter(|s| s.get("y") == Some(&b"b"[..]));
        let search = Search::new(hex, patterns, options);
        let solutions = search.solutions(&Context::background()).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("y"), Some(&b"b"[..]));
    }

    #[test]
    fn plan_is_deterministic_for_identical_inputs() {
        let hex = hexastore_with(&[("a", "k", "b")]);
        let patterns = vec![
            Pattern::new(PatternValue::Wildcard, PatternValue::Wildcard, PatternValue::Wildcard),
            Pattern::new(
                PatternValue::exact(b"a".to_vec()),
                PatternValue::Wildcard,
                PatternValue::Wildcard,
            ),
        ];
        let search1 = Search::new(Arc::clone(&hex), patterns.clone(), SearchOptions::new());
        let search2 = Search::new(hex, patterns, SearchOptions::new());
        assert_eq!(search1.plan().unwrap(), search2.plan().unwrap());
    }
}
