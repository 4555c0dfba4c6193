//! A fluent traversal builder that composes joins: each `arch_out`/`arch_in`
//! call appends a pattern to an underlying [`crate::search::Search`] plan
//! rather than walking edges one at a time.

use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;
use crate::hexastore::Hexastore;
use crate::search::{Search, SearchOptions};
use crate::triple::{Pattern, PatternValue, Solution, Triple, Variable};

/// A builder rooted at a start vertex. Every `arch_out`/`arch_in` call
/// advances `current` to a fresh join variable and appends the pattern
/// that produced it; `as_name`/`bind`/`goto` adjust the current position
/// without appending a pattern.
pub struct Navigator {
    hexastore: Arc<Hexastore>,
    patterns: Vec<Pattern>,
    current: PatternValue,
    /// `as_name(name)` records `name -> current` without touching
    /// execution; terminals inject the named position into each solution
    /// afterward, dropping branches where that injection would conflict.
    named: Vec<(Variable, PatternValue)>,
    /// `bind(value)` on an already-variable current records a post-hoc
    /// constraint instead of rewriting already-pushed patterns.
    post_binds: Vec<(Variable, Vec<u8>)>,
    next_var: usize,
    /// Set when `bind` contradicts a literal current; every terminal then
    /// short-circuits to an empty result without running the join.
    dead: bool,
}

impl Navigator {
    pub fn new(hexastore: Arc<Hexastore>, start: Vec<u8>) -> Self {
        Self {
            hexastore,
            patterns: Vec::new(),
            current: PatternValue::Exact(start),
            named: Vec::new(),
            post_binds: Vec::new(),
            next_var: 0,
            dead: false,
        }
    }

    fn fresh_var(&mut self) -> Variable {
        let name = format!("_nav{}", self.next_var);
        self.next_var += 1;
        name
    }

    /// Follows edges `(current, pred, ?next)`; `?next` becomes current.
    pub fn arch_out(mut self, pred: impl Into<Vec<u8>>) -> Self {
        let next = self.fresh_var();
        let pattern = Pattern::new(
            self.current.clone(),
            PatternValue::exact(pred.into()),
            PatternValue::binding(next.clone()),
        );
        self.patterns.push(pattern);
        self.current = PatternValue::binding(next);
        self
    }

    /// Follows edges `(?next, pred, current)`; `?next` becomes current.
    pub fn arch_in(mut self, pred: impl Into<Vec<u8>>) -> Self {
        let next = self.fresh_var();
        let pattern = Pattern::new(
            PatternValue::binding(next.clone()),
            PatternValue::exact(pred.into()),
            self.current.clone(),
        );
        self.patterns.push(pattern);
        self.current = PatternValue::binding(next);
        self
    }

    /// Names the current position for later read-out; does not affect
    /// which edges are matched.
    pub fn as_name(mut self, name: impl Into<Variable>) -> Self {
        self.named.push((name.into(), self.current.clone()));
        self
    }

    /// Constrains the current position to `value`.
    pub fn bind(mut self, value: impl Into<Vec<u8>>) -> Self {
        let value = value.into();
        match &self.current {
            PatternValue::Exact(existing) => {
                if existing != &value {
                    self.dead = true;
                }
            }
            PatternValue::Binding(var) => {
                self.post_binds.push((var.clone(), value));
            }
            PatternValue::Wildcard => self.dead = true,
        }
        self
    }

    /// Resets current to a literal vertex.
    pub fn goto(mut self, vertex: impl Into<Vec<u8>>) -> Self {
        self.current = PatternValue::Exact(vertex.into());
        self
    }

    fn options(&self) -> SearchOptions {
        let post_binds = self.post_binds.clone();
        SearchOptions::new().with_filter(move |solution: &Solution| {
            post_binds
                .iter()
                .all(|(var, value)| solution.get(var) == Some(value.as_slice()))
        })
    }

    /// Injects each `as_name`d position into `solution`, dropping it if
    /// that would conflict with an existing binding under the same name.
    fn inject_named(&self, solution: Solution) -> Option<Solution> {
        let mut current = solution;
        for (name, value) in &self.named {
            let bytes = match value {
                PatternValue::Exact(bytes) => Some(bytes.as_slice()),
                PatternValue::Binding(var) => current.get(var),
                PatternValue::Wildcard => None,
            };
            if let Some(bytes) = bytes {
                current = current.bind(name, bytes)?;
            }
        }
        Some(current)
    }

    /// All variable bindings produced by the traversal, with named
    /// positions injected.
    pub fn solutions(&self, ctx: &Context) -> Result<Vec<Solution>> {
        if self.dead {
            return Ok(Vec::new());
        }
        let search = Search::new(Arc::clone(&self.hexastore), self.patterns.clone(), self.options());
        let solutions = search.solutions(ctx)?;
        Ok(solutions.into_iter().filter_map(|s| self.inject_named(s)).collect())
    }

    /// Distinct byte strings at the current position, one per surviving
    /// solution (deduplicated).
    pub fn values(&self, ctx: &Context) -> Result<Vec<Vec<u8>>> {
        if self.dead {
            return Ok(Vec::new());
        }
        let solutions = self.solutions(ctx)?;
        let mut values: Vec<Vec<u8>> = solutions
            .iter()
            .filter_map(|s| match &self.current {
                PatternValue::Exact(bytes) => Some(bytes.clone()),
                PatternValue::Binding(var) => s.get(var).map(|b| b.to_vec()),
                PatternValue::Wildcard => None,
            })
            .collect();
        values.sort();
        values.dedup();
        Ok(values)
    }

    /// All triples visited while producing the traversal's solutions.
    pub fn triples(&self, ctx: &Context) -> Result<Vec<Triple>> {
        if self.dead {
            return Ok(Vec::new());
        }
        let search = Search::new(Arc::clone(&self.hexastore), self.patterns.clone(), self.options());
        search.triples(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory_store::MemoryStore;

    fn hexastore_with(triples: &[(&str, &str, &str)]) -> Arc<Hexastore> {
        let hex = Arc::new(Hexastore::new(Arc::new(MemoryStore::new())));
        for (s, p, o) in triples {
            hex.insert(&Triple::new(s.as_bytes().to_vec(), p.as_bytes().to_vec(), o.as_bytes().to_vec()).unwrap())
                .unwrap();
        }
        hex
    }

    #[test]
    fn arch_out_follows_outgoing_edges() {
        let hex = hexastore_with(&[("alice", "knows", "bob"), ("alice", "knows", "carol")]);
        let nav = Navigator::new(hex, b"alice".to_vec()).arch_out("knows");
        let mut values = nav.values(&Context::background()).unwrap();
        values.sort();
        assert_eq!(values, vec![b"bob".to_vec(), b"carol".to_vec()]);
    }

    #[test]
    fn arch_in_follows_incoming_edges() {
        let hex = hexastore_with(&[("alice", "knows", "bob"), ("carol", "knows", "bob")]);
        let nav = Navigator::new(hex, b"bob".to_vec()).arch_in("knows");
        let mut values = nav.values(&Context::background()).unwrap();
        values.sort();
        assert_eq!(values, vec![b"alice".to_vec(), b"carol".to_vec()]);
    }

    #[test]
    fn chained_traversal_joins_through_two_hops() {
        let hex = hexastore_with(&[("alice", "knows", "bob"), ("bob", "likes", "tea")]);
        let nav = Navigator::new(hex, b"alice".to_vec()).arch_out("knows").arch_out("likes");
        let values = nav.values(&Context::background()).unwrap();
        assert_eq!(values, vec![b"tea".to_vec()]);
    }

    #[test]
    fn as_name_surfaces_the_start_vertex_in_solutions() {
        let hex = hexastore_with(&[("alice", "knows", "bob")]);
        let nav = Navigator::new(hex, b"alice".to_vec())
            .as_name("start")
            .arch_out("knows")
            .as_name("friend");
        let solutions = nav.solutions(&Context::background()).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("start"), Some(&b"alice"[..]));
        assert_eq!(solutions[0].get("friend"), Some(&b"bob"[..]));
    }

    #[test]
    fn bind_constrains_current_to_one_value() {
        let hex = hexastore_with(&[("alice", "knows", "bob"), ("alice", "knows", "carol")]);
        let nav = Navigator::new(hex, b"alice".to_vec()).arch_out("knows").bind(b"bob".to_vec());
        let values = nav.values(&Context::background()).unwrap();
        assert_eq!(values, vec![b"bob".to_vec()]);
    }

    #[test]
    fn goto_resets_current_to_a_new_literal() {
        let hex = hexastore_with(&[("alice", "knows", "bob"), ("carol", "knows", "dave")]);
        let nav = Navigator::new(hex, b"alice".to_vec()).goto(b"carol".to_vec()).arch_out("knows");
        let values = nav.values(&Context::background()).unwrap();
        assert_eq!(values, vec![b"dave".to_vec()]);
    }

    #[test]
    fn contradictory_bind_on_a_literal_yields_empty_results() {
        let hex = hexastore_with(&[("alice", "knows", "bob")]);
        let nav = Navigator::new(hex, b"alice".to_vec()).bind(b"someone-else".to_vec());
        assert!(nav.values(&Context::background()).unwrap().is_empty());
    }
}
