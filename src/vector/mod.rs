//! Pluggable nearest-neighbor vector index, typed vector IDs, and the
//! persistence layer tying the in-memory index to `vec::<id>` records.

pub mod embed;
pub mod flat;
pub mod hnsw;
pub mod hybrid;
pub mod worker;

use std::sync::{Arc, RwLock};

use tracing::instrument;

use crate::codec::escape::escape;
use crate::error::{Error, Result};
use crate::kv::{KeyRange, KvStore};

/// A similarity search result: an id and its cosine similarity in `[-1, 1]`.
pub type ScoredId = (VectorId, f32);

/// An opaque vector identity. Typed constructors match the `vec::<id>` key
/// scheme; `Raw` covers user-supplied IDs that aren't tied to a triple
/// component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VectorId(Vec<u8>);

impl VectorId {
    pub fn subject(bytes: &[u8]) -> Self {
        Self(prefixed(b"s:", bytes))
    }

    pub fn predicate(bytes: &[u8]) -> Self {
        Self(prefixed(b"p:", bytes))
    }

    pub fn object(bytes: &[u8]) -> Self {
        Self(prefixed(b"o:", bytes))
    }

    pub fn triple(s: &[u8], p: &[u8], o: &[u8]) -> Self {
        let mut out = b"t:".to_vec();
        out.extend_from_slice(&escape(s));
        out.push(b':');
        out.extend_from_slice(&escape(p));
        out.push(b':');
        out.extend_from_slice(&escape(o));
        Self(out)
    }

    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

fn prefixed(tag: &[u8], bytes: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(bytes);
    out
}

/// The kind of id a [`crate::vector::hybrid::VectorFilter`] should build
/// from a solution's bound bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Subject,
    Predicate,
    Object,
    Raw,
}

impl IdKind {
    pub fn build(self, bytes: &[u8]) -> VectorId {
        match self {
            IdKind::Subject => VectorId::subject(bytes),
            IdKind::Predicate => VectorId::predicate(bytes),
            IdKind::Object => VectorId::object(bytes),
            IdKind::Raw => VectorId::raw(bytes.to_vec()),
        }
    }
}

/// Capability interface every vector index (flat or HNSW) implements.
pub trait VectorIndex: Send + Sync {
    fn insert(&self, id: VectorId, vector: Vec<f32>) -> Result<()>;
    fn delete(&self, id: &VectorId) -> Result<()>;
    fn update(&self, id: VectorId, vector: Vec<f32>) -> Result<()>;
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>>;
    fn dimensions(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalizes `v` to unit length in place. A zero vector is left unchanged
/// (cosine similarity against it is defined as 0 everywhere).
pub fn normalize(v: &mut [f32]) {
    let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two already-normalized vectors (a plain dot
/// product). Returns 0.0 if either is the zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

const VEC_PREFIX: &[u8] = b"vec::";

fn vec_key(id: &VectorId) -> Vec<u8> {
    let mut out = VEC_PREFIX.to_vec();
    out.extend_from_slice(id.as_bytes());
    out
}

fn encode_vector(v: &[f32]) -> Result<Vec<u8>> {
    let dims: u16 = v
        .len()
        .try_into()
        .map_err(|_| Error::Other("vector dimension exceeds u16::MAX".into()))?;
    let mut out = Vec::with_capacity(2 + v.len() * 4);
    out.extend_from_slice(&dims.to_be_bytes());
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    Ok(out)
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() < 2 {
        return Err(Error::DecodeError("vector record truncated".into()));
    }
    let dims = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let expected_len = 2 + dims * 4;
    if bytes.len() != expected_len {
        return Err(Error::DecodeError(format!(
            "vector record length {} does not match declared dims {dims}",
            bytes.len()
        )));
    }
    let mut out = Vec::with_capacity(dims);
    for chunk in bytes[2..].chunks_exact(4) {
        out.push(f32::from_le_bytes(chunk.try_into().unwrap()));
    }
    Ok(out)
}

/// Ties a [`VectorIndex`] to `vec::<id>` persistence: every mutation writes
/// through to the store before updating the in-memory index.
pub struct VectorStore {
    kv: Arc<dyn KvStore>,
    index: RwLock<Arc<dyn VectorIndex>>,
}

impl VectorStore {
    pub fn new(kv: Arc<dyn KvStore>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            kv,
            index: RwLock::new(index),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.index.read().unwrap().dimensions()
    }

    /// Scans every `vec::*` record, validates its dimension against the
    /// configured index, and inserts it into the in-memory index.
    #[instrument(skip(self))]
    pub fn load_vectors(&self) -> Result<usize> {
        let upper = crate::codec::key::increment_bytes(VEC_PREFIX);
        let range = KeyRange::new(VEC_PREFIX.to_vec(), upper);
        let expected = self.dimensions();
        let mut count = 0;
        for item in self.kv.range(range, false)? {
            let (key, value) = item?;
            let id = VectorId(key[VEC_PREFIX.len()..].to_vec());
            let vector = decode_vector(&value)?;
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            self.index.read().unwrap().insert(id, vector)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn set_vector(&self, id: VectorId, mut vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimensions() {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions(),
                actual: vector.len(),
            });
        }
        normalize(&mut vector);
        let key = vec_key(&id);
        let existed = self.kv.get(&key)?.is_some();
        let encoded = encode_vector(&vector)?;
        self.kv.put(&key, &encoded)?;
        let index = self.index.read().unwrap();
        if existed {
            index.update(id, vector)
        } else {
            index.insert(id, vector)
        }
    }

    pub fn delete_vector(&self, id: &VectorId) -> Result<()> {
        self.kv.delete(&vec_key(id))?;
        self.index.read().unwrap().delete(id)
    }

    pub fn get_vector(&self, id: &VectorId) -> Result<Option<Vec<f32>>> {
        match self.kv.get(&vec_key(id))? {
            Some(bytes) => Ok(Some(decode_vector(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        let mut q = query.to_vec();
        normalize(&mut q);
        self.index.read().unwrap().search(&q, k)
    }

    pub fn len(&self) -> usize {
        self.index.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory_store::MemoryStore;
    use crate::vector::flat::FlatIndex;

    #[test]
    fn vector_record_round_trips() {
        let v = vec![1.0f32, -2.5, 0.0, 3.25];
        let encoded = encode_vector(&v).unwrap();
        let decoded = decode_vector(&encoded).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn set_and_get_vector_round_trip_through_store() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let index: Arc<dyn VectorIndex> = Arc::new(FlatIndex::new(3));
        let store = VectorStore::new(kv, index);
        store.set_vector(VectorId::raw(b"a".to_vec()), vec![1.0, 0.0, 0.0]).unwrap();
        let fetched = store.get_vector(&VectorId::raw(b"a".to_vec())).unwrap().unwrap();
        assert!((fetched[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn load_vectors_rejects_dimension_mismatch() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        kv.put(&vec_key(&VectorId::raw(b"a".to_vec())), &encode_vector(&[1.0, 0.0, 0.0, 0.0, 0.0]).unwrap())
            .unwrap();
        let index: Arc<dyn VectorIndex> = Arc::new(FlatIndex::new(3));
        let store = VectorStore::new(kv, index);
        assert!(matches!(store.load_vectors(), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn normalize_produces_unit_vectors() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        let norm = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
