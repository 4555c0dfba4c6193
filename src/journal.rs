//! Append-only write-ahead log of every successful triple mutation.
//!
//! Entries are stored under `journal::<be64(seq)>` and are never mutated in
//! place; [`Journal::trim`] only ever deletes a contiguous prefix.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;

use crate::codec::triple_codec;
use crate::error::{Error, Result};
use crate::kv::{KeyRange, KvStore, WriteBatch};
use crate::triple::Triple;

const PREFIX: &[u8] = b"journal::";
const OP_PUT: u8 = 0;
const OP_DEL: u8 = 1;

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub seq: u64,
    pub timestamp: OffsetDateTime,
    pub op: Op,
    pub triple: Triple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Put,
    Del,
}

/// Something a [`Journal`] can be replayed onto, without re-journaling the
/// replayed mutations.
pub trait ReplayTarget {
    fn apply_put(&self, triple: &Triple) -> Result<()>;
    fn apply_del(&self, triple: &Triple) -> Result<()>;
}

fn journal_key(seq: u64) -> Vec<u8> {
    let mut key = PREFIX.to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Encodes the timestamp as nanoseconds since the epoch in a `be64`, per the
/// journal entry's wire contract. This saturates rather than overflows for
/// an `OffsetDateTime` outside `i64`'s nanosecond range (roughly years
/// 1678-2262), which no wall clock driving this journal will ever reach.
fn encode_entry(seq: u64, timestamp: OffsetDateTime, op: Op, triple: &Triple) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&seq.to_be_bytes());
    let nanos = timestamp.unix_timestamp_nanos().clamp(i64::MIN as i128, i64::MAX as i128) as i64;
    out.extend_from_slice(&nanos.to_be_bytes());
    out.push(match op {
        Op::Put => OP_PUT,
        Op::Del => OP_DEL,
    });
    out.extend_from_slice(&triple_codec::encode_binary(triple));
    out
}

fn decode_entry(value: &[u8]) -> Result<JournalEntry> {
    if value.len() < 8 + 8 + 1 {
        return Err(Error::DecodeError("journal entry truncated".into()));
    }
    let seq = u64::from_be_bytes(value[0..8].try_into().unwrap());
    let nanos = i64::from_be_bytes(value[8..16].try_into().unwrap());
    let timestamp = OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|e| Error::DecodeError(e.to_string()))?;
    let op = match value[16] {
        OP_PUT => Op::Put,
        OP_DEL => Op::Del,
        other => return Err(Error::DecodeError(format!("unknown journal op byte {other}"))),
    };
    let triple = triple_codec::decode_binary(&value[17..])?;
    Ok(JournalEntry {
        seq,
        timestamp,
        op,
        triple,
    })
}

/// The append-only mutation log, backed by the same `KvStore` as the
/// hexastore.
pub struct Journal {
    kv: Arc<dyn KvStore>,
    next_seq: AtomicU64,
}

impl Journal {
    /// Opens the journal, recovering the durable sequence counter by
    /// scanning the greatest key under `journal::`.
    pub fn open(kv: Arc<dyn KvStore>) -> Result<Self> {
        let upper = crate::codec::key::increment_bytes(PREFIX);
        let range = KeyRange::new(PREFIX.to_vec(), upper);
        let last = kv.range(range, true)?.next();
        let next_seq = match last {
            Some(entry) => {
                let (_, value) = entry?;
                decode_entry(&value)?.seq + 1
            }
            None => 0,
        };
        Ok(Self {
            kv,
            next_seq: AtomicU64::new(next_seq),
        })
    }

    /// Appends one entry, stamped with the current wall-clock time, and
    /// adds it to `batch` rather than writing immediately: the entry
    /// commits atomically alongside whatever hexastore mutation caused it.
    pub fn append_to_batch(&self, batch: &mut WriteBatch, op: Op, triple: &Triple) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let entry = encode_entry(seq, OffsetDateTime::now_utc(), op, triple);
        batch.put(journal_key(seq), entry);
        seq
    }

    /// All entries whose timestamp is `>= since`, in sequence order.
    ///
    /// Journal timestamps are monotonic non-decreasing with sequence
    /// number (entries are appended in real-time order), so a forward
    /// linear scan that stops at the first qualifying entry is exact; it
    /// is not a binary search only because the store does not expose
    /// random access by ordinal position.
    pub fn entries_since(&self, since: OffsetDateTime) -> Result<Vec<JournalEntry>> {
        let upper = crate::codec::key::increment_bytes(PREFIX);
        let range = KeyRange::new(PREFIX.to_vec(), upper);
        let mut out = Vec::new();
        for item in self.kv.range(range, false)? {
            let (_, value) = item?;
            let entry = decode_entry(&value)?;
            if entry.timestamp >= since {
                out.push(entry);
            }
        }
        Ok(out)
    }

    /// Deletes every entry with `timestamp < before`.
    pub fn trim(&self, before: OffsetDateTime) -> Result<usize> {
        let upper = crate::codec::key::increment_bytes(PREFIX);
        let range = KeyRange::new(PREFIX.to_vec(), upper);
        let mut batch = WriteBatch::new();
        for item in self.kv.range(range, false)? {
            let (key, value) = item?;
            let entry = decode_entry(&value)?;
            if entry.timestamp < before {
                batch.delete(key);
            } else {
                break;
            }
        }
        let count = batch.deletes.len();
        if count > 0 {
            debug!(count, "trimming journal entries");
            self.kv.write_batch(batch)?;
        }
        Ok(count)
    }

    /// Moves every entry with `timestamp < before` into `sink`, deleting it
    /// from this journal.
    ///
    /// This is at-least-once, not atomic: each entry is written to `sink`
    /// and then deleted here as two independent `KvStore` writes with no
    /// shared transaction and no rollback. A crash between the two can
    /// leave the entry present in both journals (never in neither — the
    /// delete only runs after the write to `sink` succeeds). Safe to leave
    /// this way because replaying a journal is itself idempotent:
    /// `Hexastore::insert`/`remove` are no-ops when the triple's presence
    /// already matches the requested state, so a duplicated entry applied
    /// twice (once from each copy) has no observable effect.
    pub fn trim_and_export(&self, before: OffsetDateTime, sink: &Journal) -> Result<usize> {
        let upper = crate::codec::key::increment_bytes(PREFIX);
        let range = KeyRange::new(PREFIX.to_vec(), upper);
        let mut moved = 0;
        let mut to_export = Vec::new();
        for item in self.kv.range(range, false)? {
            let (key, value) = item?;
            let entry = decode_entry(&value)?;
            if entry.timestamp < before {
                to_export.push((key, value));
            } else {
                break;
            }
        }
        for (key, value) in to_export {
            sink.kv.put(&key, &value)?;
            self.kv.delete(&key)?;
            moved += 1;
        }
        Ok(moved)
    }

    /// Re-applies every entry, in sequence order, onto `target`.
    pub fn replay<T: ReplayTarget>(&self, target: &T) -> Result<usize> {
        let upper = crate::codec::key::increment_bytes(PREFIX);
        let range = KeyRange::new(PREFIX.to_vec(), upper);
        let mut count = 0;
        for item in self.kv.range(range, false)? {
            let (_, value) = item?;
            let entry = decode_entry(&value)?;
            match entry.op {
                Op::Put => target.apply_put(&entry.triple)?,
                Op::Del => target.apply_del(&entry.triple)?,
            }
            count += 1;
        }
        Ok(count)
    }
}
