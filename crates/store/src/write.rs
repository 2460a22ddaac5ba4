//! Write path: `put()`, `delete()`, and memtable rotation.
//!
//! Every mutation is appended to the WAL before it touches the memtable,
//! and both carry the exact same entry (one timestamp per mutation). The
//! rotation protocol runs under the memtable write lock.

use memtable::{Entry, Memtable};
use std::sync::Arc;

use crate::{flush, MemtablePair, Result, Store, StoreError};

impl Store {
    /// Inserts or overwrites a key-value pair.
    ///
    /// Durable once this returns: the WAL append is flushed and synced
    /// before the memtable is touched.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] for an empty key; WAL or flush I/O
    /// errors otherwise.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key must not be empty"));
        }
        self.apply(Entry::new(key, value))
    }

    /// Deletes a key by writing a tombstone.
    ///
    /// The tombstone shadows any older value in the memtables and on disk
    /// until compaction garbage-collects it.
    pub fn delete(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key must not be empty"));
        }
        self.apply(Entry::tombstone(key))
    }

    fn apply(&self, entry: Entry) -> Result<()> {
        // WAL first: the mutation must be durable before it is visible.
        self.shared.wal.append(&entry)?;

        let mut pair = self.shared.memtables.write();
        pair.active.insert(entry);

        if pair.active.size_bytes() >= self.shared.config.memtable_max_size() {
            self.rotate_memtable(&mut pair)?;
        }
        Ok(())
    }

    /// Rotates the memtable pair. Caller holds the write lock.
    ///
    /// 1. If a previous rotation's flush is still pending, complete it
    ///    synchronously and empty the slot.
    /// 2. Move active → immutable and install a fresh active memtable.
    /// 3. Clear the WAL; its contents now belong to the pending flush.
    /// 4. Hand the immutable memtable to the background worker.
    fn rotate_memtable(&self, pair: &mut MemtablePair) -> Result<()> {
        if let Some(immutable) = pair.immutable.clone() {
            // Only empty the slot once the flush has succeeded; on error
            // the memtable must stay readable (its WAL segment is gone).
            let snapshot = flush::flush_memtable(&self.shared, &immutable)?;
            pair.immutable = None;
            if let Some(snapshot) = snapshot {
                self.compactor.maybe_compact(snapshot);
            }
        }

        let full = std::mem::replace(&mut pair.active, Arc::new(Memtable::new()));
        pair.immutable = Some(Arc::clone(&full));

        self.shared.wal.clear()?;

        self.compactor.schedule_flush(full);
        Ok(())
    }
}
