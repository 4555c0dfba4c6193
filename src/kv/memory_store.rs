//! A `KvStore` backed by an in-memory `BTreeMap`, for ephemeral databases
//! and tests.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use ouroboros::self_referencing;

use crate::error::Result;
use crate::kv::{KeyRange, KvIter, KvStore, WriteBatch};

#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().unwrap().get(key).cloned())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let mut map = self.map.write().unwrap();
        for (key, value) in batch.puts {
            map.insert(key, value);
        }
        for key in batch.deletes {
            map.remove(&key);
        }
        Ok(())
    }

    fn range(&self, range: KeyRange, reverse: bool) -> Result<KvIter<'_>> {
        let cursor = MemoryCursor::create(Arc::clone(&self.map), range, reverse);
        Ok(Box::new(cursor))
    }
}

#[self_referencing]
struct MemoryCursor {
    map: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    #[borrows(map)]
    #[covariant]
    guard: RwLockReadGuard<'this, BTreeMap<Vec<u8>, Vec<u8>>>,
    #[borrows(guard)]
    #[covariant]
    iter: btree_map::Range<'this, Vec<u8>, Vec<u8>>,
    reverse: bool,
}

impl MemoryCursor {
    fn create(map: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>, range: KeyRange, reverse: bool) -> Self {
        let start = range.start;
        let end = range.end;
        MemoryCursorBuilder {
            map,
            guard_builder: |map| map.read().unwrap(),
            iter_builder: move |guard| match &end {
                Some(end) => guard.range(start.clone()..end.clone()),
                None => guard.range(start.clone()..),
            },
            reverse,
        }
        .build()
    }
}

impl Iterator for MemoryCursor {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let reverse = *self.borrow_reverse();
        self.with_iter_mut(|iter| {
            let entry = if reverse { iter.next_back() } else { iter.next() };
            entry.map(|(k, v)| Ok((k.clone(), v.clone())))
        })
    }
}
