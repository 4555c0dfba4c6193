//! A generic ordered byte-string key-value abstraction.
//!
//! Every subsystem above this layer — the hexastore, the journal, facets,
//! and vector records — shares one physical key space (`spo::…`,
//! `journal::…`, `facet::…`, `vec::…`) inside a single store, distinguished
//! only by key prefix. `KvStore` is deliberately untyped (`&[u8]` keys and
//! values) so that a single backend can hold all of them.

pub mod memory_store;
pub mod redb_store;

use crate::error::Result;

/// An inclusive/exclusive byte-range bound for a scan. `end: None` means
/// unbounded (scan to the end of the key space).
#[derive(Debug, Clone)]
pub struct KeyRange {
    pub start: Vec<u8>,
    /// Exclusive upper bound. `None` means unbounded above.
    pub end: Option<Vec<u8>>,
}

impl KeyRange {
    pub fn new(start: Vec<u8>, end: Option<Vec<u8>>) -> Self {
        Self { start, end }
    }

    pub fn from_prefix(prefix: Vec<u8>, exclusive_end: Option<Vec<u8>>) -> Self {
        Self {
            start: prefix,
            end: exclusive_end,
        }
    }
}

/// A single-writer, multi-reader batch of key-value mutations applied
/// atomically by [`KvStore::write_batch`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub puts: Vec<(Vec<u8>, Vec<u8>)>,
    pub deletes: Vec<Vec<u8>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.puts.push((key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.deletes.push(key.into());
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// An iterator over `(key, value)` pairs within a snapshot taken at the
/// time the range scan began. Later writes to the store do not affect an
/// iterator already in flight.
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + 'a>;

/// An ordered key-value store keyed and valued by raw bytes.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key.to_vec(), value.to_vec());
        self.write_batch(batch)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key.to_vec());
        self.write_batch(batch)
    }

    /// Applies every put and delete in `batch` as a single atomic unit.
    fn write_batch(&self, batch: WriteBatch) -> Result<()>;

    /// Scans `range` in ascending key order, or descending if `reverse`.
    fn range(&self, range: KeyRange, reverse: bool) -> Result<KvIter<'_>>;

    /// Number of entries whose key starts with `prefix`.
    fn count_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let upper = crate::codec::key::increment_bytes(prefix);
        let range = KeyRange::new(prefix.to_vec(), upper);
        Ok(self.range(range, false)?.filter_map(|r| r.ok()).count())
    }
}
