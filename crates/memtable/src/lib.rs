//! # Memtable - in-memory write buffer
//!
//! The sorted, thread-safe staging area for recent writes. Every mutation
//! lands here (after the WAL has made it durable) and is served from here
//! until the memtable fills up, rotates, and is flushed to an SSTable.
//!
//! ## Model
//!
//! A `BTreeMap<String, Entry>` keyed by entry key, so iteration is always
//! in ascending key order, exactly the order an SSTable wants. Overwrites
//! and deletes both insert a fresh [`Entry`]; a delete inserts a tombstone
//! that shadows older values on disk until compaction collects it.
//!
//! ## Size accounting
//!
//! The memtable tracks an *approximate* byte size used only as the flush
//! trigger: `key_bytes + value_bytes + 9` per entry (8 bytes timestamp,
//! 1 byte tombstone flag), with the replaced entry's contribution
//! subtracted on overwrite.
//!
//! ## Thread safety
//!
//! All methods take `&self`; an internal `parking_lot::RwLock` serialises
//! mutation. [`Memtable::snapshot`] returns an ordered copy that stays
//! valid while the memtable continues to mutate.

mod entry;

pub use entry::{next_timestamp, observe_timestamp, Entry};

use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Fixed metadata overhead per entry: timestamp (8) + tombstone flag (1).
const ENTRY_OVERHEAD: usize = 9;

fn estimated_size(entry: &Entry) -> usize {
    entry.key().len() + entry.value().map_or(0, str::len) + ENTRY_OVERHEAD
}

struct Inner {
    map: BTreeMap<String, Entry>,
    size: usize,
}

/// Thread-safe ordered map of recent writes.
pub struct Memtable {
    inner: RwLock<Inner>,
}

impl Memtable {
    /// Creates an empty memtable.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                map: BTreeMap::new(),
                size: 0,
            }),
        }
    }

    /// Inserts an already-constructed entry, replacing any older entry for
    /// the same key.
    ///
    /// This is the core mutation: the store inserts the exact entry it
    /// appended to the WAL, so both carry the same timestamp.
    pub fn insert(&self, entry: Entry) {
        let mut inner = self.inner.write();
        let added = estimated_size(&entry);
        if let Some(old) = inner.map.insert(entry.key().to_owned(), entry) {
            let removed = estimated_size(&old);
            inner.size = inner.size.saturating_sub(removed);
        }
        inner.size += added;
    }

    /// Inserts a live entry for `key` with the current timestamp.
    pub fn put(&self, key: &str, value: &str) {
        self.insert(Entry::new(key, value));
    }

    /// Inserts a tombstone for `key` with the current timestamp.
    pub fn delete(&self, key: &str) {
        self.insert(Entry::tombstone(key));
    }

    /// Returns the entry for `key`, tombstones included.
    ///
    /// Callers translate a tombstone hit into "not present"; the hit still
    /// matters because it must shadow older values on disk.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.inner.read().map.get(key).cloned()
    }

    /// Approximate size of the buffered entries in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.inner.read().size
    }

    /// Number of buffered entries (tombstones included).
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.inner.read().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().map.is_empty()
    }

    /// Returns an ordered copy of all entries, safe to iterate while the
    /// memtable keeps mutating. Used by the flush path.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Entry> {
        self.inner.read().map.clone()
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}
