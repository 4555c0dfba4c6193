//! The six-way hexastore index: every stored triple is written under six
//! keys, one per [`crate::codec::key::IndexTag`] ordering, so that any
//! pattern with at least one concrete component can be answered by a single
//! ordered range scan instead of a full table scan.

use std::sync::Arc;

use crate::codec::key::{self, Component, IndexTag};
use crate::codec::triple_codec;
use crate::error::Result;
use crate::journal::{Journal, Op};
use crate::kv::{KeyRange, KvStore, WriteBatch};
use crate::triple::{Pattern, PatternValue, Triple};

/// Stores and queries triples via the six-key hexastore scheme over a
/// `KvStore`.
pub struct Hexastore {
    kv: Arc<dyn KvStore>,
}

impl Hexastore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn all_keys(triple: &Triple) -> [Vec<u8>; 6] {
        let (s, p, o) = (triple.subject(), triple.predicate(), triple.object());
        IndexTag::ALL_ALPHABETICAL.map(|tag| key::assemble_key(tag, s, p, o))
    }

    /// Inserts `triple`, writing all six keys atomically. Returns `false`
    /// (a no-op) if the triple was already present.
    pub fn insert(&self, triple: &Triple) -> Result<bool> {
        let spo_key = key::assemble_key(IndexTag::Spo, triple.subject(), triple.predicate(), triple.object());
        if self.kv.get(&spo_key)?.is_some() {
            return Ok(false);
        }
        let value = triple_codec::encode_binary(triple);
        let mut batch = WriteBatch::new();
        for k in Self::all_keys(triple) {
            batch.put(k, value.clone());
        }
        self.kv.write_batch(batch)?;
        Ok(true)
    }

    /// Removes `triple`, deleting all six keys atomically. Returns `false`
    /// if the triple was not present.
    pub fn remove(&self, triple: &Triple) -> Result<bool> {
        let spo_key = key::assemble_key(IndexTag::Spo, triple.subject(), triple.predicate(), triple.object());
        if self.kv.get(&spo_key)?.is_none() {
            return Ok(false);
        }
        let mut batch = WriteBatch::new();
        for k in Self::all_keys(triple) {
            batch.delete(k);
        }
        self.kv.write_batch(batch)?;
        Ok(true)
    }

    /// As [`Hexastore::insert`], but commits the journal entry in the same
    /// atomic batch as the index keys, so a crash never leaves the journal
    /// out of sync with the index.
    pub fn insert_with_journal(&self, journal: &Journal, triple: &Triple) -> Result<bool> {
        let spo_key = key::assemble_key(IndexTag::Spo, triple.subject(), triple.predicate(), triple.object());
        if self.kv.get(&spo_key)?.is_some() {
            return Ok(false);
        }
        let value = triple_codec::encode_binary(triple);
        let mut batch = WriteBatch::new();
        for k in Self::all_keys(triple) {
            batch.put(k, value.clone());
        }
        journal.append_to_batch(&mut batch, Op::Put, triple);
        self.kv.write_batch(batch)?;
        Ok(true)
    }

    /// As [`Hexastore::remove`], journaled atomically alongside the delete.
    pub fn remove_with_journal(&self, journal: &Journal, triple: &Triple) -> Result<bool> {
        let spo_key = key::assemble_key(IndexTag::Spo, triple.subject(), triple.predicate(), triple.object());
        if self.kv.get(&spo_key)?.is_none() {
            return Ok(false);
        }
        let mut batch = WriteBatch::new();
        for k in Self::all_keys(triple) {
            batch.delete(k);
        }
        journal.append_to_batch(&mut batch, Op::Del, triple);
        self.kv.write_batch(batch)?;
        Ok(true)
    }

    /// Returns whether `triple` is present, via a direct point lookup.
    pub fn contains(&self, triple: &Triple) -> Result<bool> {
        let spo_key = key::assemble_key(IndexTag::Spo, triple.subject(), triple.predicate(), triple.object());
        Ok(self.kv.get(&spo_key)?.is_some())
    }

    /// Total number of distinct triples stored, counted via the `spo::`
    /// index (each triple appears exactly once there).
    pub fn len(&self) -> Result<usize> {
        self.kv.count_prefix(b"spo::")
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Bounded-probe cardinality estimate for `pattern`, used by the query
    /// planner to order a multi-pattern search smallest-first. Fully-bound
    /// patterns are always 0 or 1; otherwise counts matching keys up to
    /// `PROBE_CAP`, which stands in for the true count when the range is
    /// larger (the planner only needs a relative ordering, not an exact
    /// count).
    pub fn estimate_cardinality(&self, pattern: &Pattern) -> Result<usize> {
        const PROBE_CAP: usize = 256;
        let concrete = concrete_components(pattern);
        if concrete.len() == 3 {
            return Ok(if self.query_exact(pattern)?.is_empty() { 0 } else { 1 });
        }
        let tag = key::find_index(&concrete);
        let order = tag.field_order();
        let by_component = |c: Component| match c {
            Component::Subject => pattern.subject(),
            Component::Predicate => pattern.predicate(),
            Component::Object => pattern.object(),
        };
        let mut concrete_fields = Vec::new();
        for component in order {
            match by_component(component) {
                PatternValue::Exact(bytes) => concrete_fields.push(bytes.as_slice()),
                _ => break,
            }
        }
        let prefix = key::assemble_prefix(tag, &concrete_fields);
        let upper = key::increment_bytes(&prefix);
        let range = KeyRange::new(prefix, upper);
        Ok(self.kv.range(range, false)?.take(PROBE_CAP).filter_map(|r| r.ok()).count())
    }

    /// Returns every triple matching `pattern`, already respecting its
    /// `reverse`, `offset`, and `limit` fields.
    ///
    /// A fully-bound pattern (every slot `Exact`) is answered by a direct
    /// point lookup rather than a range scan: an assembled full key is not
    /// always an unambiguous prefix of only itself (`"spo::ab::c::d"` is a
    /// true byte-prefix of `"spo::ab::c::de"`), so range scanning on a
    /// complete key could overmatch.
    pub fn query(&self, pattern: &Pattern) -> Result<Vec<Triple>> {
        let concrete = concrete_components(pattern);
        let results = if concrete.len() == 3 {
            self.query_exact(pattern)?
        } else {
            self.query_range(pattern, &concrete)?
        };
        Ok(apply_pattern_window(results, pattern))
    }

    fn query_exact(&self, pattern: &Pattern) -> Result<Vec<Triple>> {
        let (s, p, o) = (
            exact_bytes(pattern.subject()),
            exact_bytes(pattern.predicate()),
            exact_bytes(pattern.object()),
        );
        let (s, p, o) = (s.unwrap(), p.unwrap(), o.unwrap());
        let triple = Triple::new(s.to_vec(), p.to_vec(), o.to_vec())?;
        if self.contains(&triple)? {
            Ok(vec![triple])
        } else {
            Ok(vec![])
        }
    }

    fn query_range(&self, pattern: &Pattern, concrete: &[Component]) -> Result<Vec<Triple>> {
        let tag = key::find_index(concrete);
        let order = tag.field_order();
        let by_component = |c: Component| match c {
            Component::Subject => pattern.subject(),
            Component::Predicate => pattern.predicate(),
            Component::Object => pattern.object(),
        };

        let mut concrete_fields = Vec::new();
        for component in order {
            match by_component(component) {
                PatternValue::Exact(bytes) => concrete_fields.push(bytes.as_slice()),
                _ => break,
            }
        }

        let prefix = key::assemble_prefix(tag, &concrete_fields);
        let upper = key::increment_bytes(&prefix);
        let range = KeyRange::new(prefix, upper);

        let mut triples = Vec::new();
        for entry in self.kv.range(range, false)? {
            let (_, value) = entry?;
            triples.push(triple_codec::decode_binary(&value)?);
        }
        Ok(triples)
    }
}

fn exact_bytes(value: &PatternValue) -> Option<&[u8]> {
    match value {
        PatternValue::Exact(bytes) => Some(bytes.as_slice()),
        _ => None,
    }
}

fn concrete_components(pattern: &Pattern) -> Vec<Component> {
    let mut out = Vec::new();
    if pattern.subject().is_concrete() {
        out.push(Component::Subject);
    }
    if pattern.predicate().is_concrete() {
        out.push(Component::Predicate);
    }
    if pattern.object().is_concrete() {
        out.push(Component::Object);
    }
    out
}

fn apply_pattern_window(mut triples: Vec<Triple>, pattern: &Pattern) -> Vec<Triple> {
    if pattern.reverse() {
        triples.reverse();
    }
    if let Some(filter) = pattern.filter() {
        triples.retain(|t| filter(t));
    }
    let offset = pattern.offset().min(triples.len());
    triples.drain(..offset);
    if let Some(limit) = pattern.limit() {
        triples.truncate(limit);
    }
    triples
}
