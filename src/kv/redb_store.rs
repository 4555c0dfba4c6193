//! A `KvStore` backed by a single redb table, for on-disk persistence.

use std::path::Path;

use ouroboros::self_referencing;
use redb::{Database, Range, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition};

use crate::error::Result;
use crate::kv::{KeyRange, KvIter, KvStore, WriteBatch};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kv");

#[derive(Debug)]
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TABLE)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            for (key, value) in &batch.puts {
                table.insert(key.as_slice(), value.as_slice())?;
            }
            for key in &batch.deletes {
                table.remove(key.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn range(&self, range: KeyRange, reverse: bool) -> Result<KvIter<'_>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TABLE)?;
        let cursor = RedbCursor::create(txn, table, range, reverse)?;
        Ok(Box::new(cursor))
    }
}

#[self_referencing]
struct RedbCursor {
    txn: ReadTransaction,
    table: redb::ReadOnlyTable<&'static [u8], &'static [u8]>,
    #[borrows(table)]
    #[covariant]
    iter: Range<'this, &'static [u8], &'static [u8]>,
    reverse: bool,
}

impl RedbCursor {
    fn create(
        txn: ReadTransaction,
        table: redb::ReadOnlyTable<&'static [u8], &'static [u8]>,
        range: KeyRange,
        reverse: bool,
    ) -> Result<Self> {
        let start = range.start;
        let end = range.end;
        RedbCursorTryBuilder {
            txn,
            table,
            iter_builder: move |table| -> Result<Range<'_, &'static [u8], &'static [u8]>> {
                let iter = match &end {
                    Some(end) => table.range(start.as_slice()..end.as_slice())?,
                    None => table.range(start.as_slice()..)?,
                };
                Ok(iter)
            },
            reverse,
        }
        .try_build()
    }
}

impl Iterator for RedbCursor {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let reverse = *self.borrow_reverse();
        self.with_iter_mut(|iter| {
            let entry = if reverse { iter.next_back() } else { iter.next() };
            entry.map(|entry| {
                let (key, value) = entry?;
                Ok((key.value().to_vec(), value.value().to_vec()))
            })
        })
    }
}
