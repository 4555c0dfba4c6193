//! Property side-table keyed by a triple component or by a whole triple.
//!
//! Facets live in their own key space (`facet::c::…` / `facet::t::…`,
//! see [`crate::codec::key`]'s escaping) independent of the hexastore:
//! deleting a triple does not touch its component-level facets, since those
//! may be shared by other triples referencing the same component.

use std::sync::Arc;

use crate::codec::escape::escape;
use crate::error::Result;
use crate::kv::{KeyRange, KvStore, WriteBatch};
use crate::triple::Triple;

/// Which part of a triple a component-level facet is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetComponent {
    Subject,
    Predicate,
    Object,
}

impl FacetComponent {
    fn tag(self) -> &'static [u8] {
        match self {
            FacetComponent::Subject => b"s",
            FacetComponent::Predicate => b"p",
            FacetComponent::Object => b"o",
        }
    }
}

fn component_key(component_bytes: &[u8], key: &str) -> Vec<u8> {
    let mut out = b"facet::c::".to_vec();
    out.extend_from_slice(&escape(component_bytes));
    out.extend_from_slice(b"::");
    out.extend_from_slice(&escape(key.as_bytes()));
    out
}

fn triple_key(triple: &Triple, key: &str) -> Vec<u8> {
    let mut out = b"facet::t::".to_vec();
    out.extend_from_slice(&escape(triple.subject()));
    out.extend_from_slice(b"::");
    out.extend_from_slice(&escape(triple.predicate()));
    out.extend_from_slice(b"::");
    out.extend_from_slice(&escape(triple.object()));
    out.extend_from_slice(b"::");
    out.extend_from_slice(&escape(key.as_bytes()));
    out
}

fn triple_prefix(triple: &Triple) -> Vec<u8> {
    let mut out = b"facet::t::".to_vec();
    out.extend_from_slice(&escape(triple.subject()));
    out.extend_from_slice(b"::");
    out.extend_from_slice(&escape(triple.predicate()));
    out.extend_from_slice(b"::");
    out.extend_from_slice(&escape(triple.object()));
    out.extend_from_slice(b"::");
    out
}

/// Reads and writes facet properties.
pub struct Facets {
    kv: Arc<dyn KvStore>,
}

impl Facets {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Sets a facet on a triple component. Note: `component_bytes` names
    /// the value (e.g. a subject's bytes), not which slot it occupies — a
    /// facet on `"alice"` applies wherever `"alice"` appears, whether as a
    /// subject or object.
    pub fn set_component(&self, _component: FacetComponent, component_bytes: &[u8], key: &str, value: &[u8]) -> Result<()> {
        self.kv.put(&component_key(component_bytes, key), value)
    }

    pub fn get_component(&self, component_bytes: &[u8], key: &str) -> Result<Option<Vec<u8>>> {
        self.kv.get(&component_key(component_bytes, key))
    }

    pub fn delete_component(&self, component_bytes: &[u8], key: &str) -> Result<()> {
        self.kv.delete(&component_key(component_bytes, key))
    }

    pub fn set_triple(&self, triple: &Triple, key: &str, value: &[u8]) -> Result<()> {
        self.kv.put(&triple_key(triple, key), value)
    }

    pub fn get_triple(&self, triple: &Triple, key: &str) -> Result<Option<Vec<u8>>> {
        self.kv.get(&triple_key(triple, key))
    }

    pub fn delete_triple(&self, triple: &Triple, key: &str) -> Result<()> {
        self.kv.delete(&triple_key(triple, key))
    }

    /// Deletes every facet stored for `triple` (all keys, regardless of
    /// which facet `key` they were stored under). Called when a triple is
    /// deleted, per the cascade-on-delete decision recorded in DESIGN.md.
    pub fn delete_all_for_triple(&self, triple: &Triple) -> Result<()> {
        let prefix = triple_prefix(triple);
        let upper = crate::codec::key::increment_bytes(&prefix);
        let range = KeyRange::new(prefix, upper);
        let mut batch = WriteBatch::new();
        for item in self.kv.range(range, false)? {
            let (key, _) = item?;
            batch.delete(key);
        }
        if !batch.is_empty() {
            self.kv.write_batch(batch)?;
        }
        Ok(())
    }
}
