//! # Store - the SiltKV LSM-tree facade
//!
//! The central orchestrator tying the [`wal`], [`memtable`], and
//! [`sstable`] crates together into a persistent, crash-safe key-value
//! store.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                    STORE                      │
//! │                                               │
//! │ write.rs → WAL append → active memtable       │
//! │              |                                │
//! │              |  (memtable_max_size reached?)  │
//! │              |            yes                 │
//! │              v                                │
//! │        rotate: active → immutable,            │
//! │        clear WAL, schedule async flush        │
//! │              |                                │
//! │              v                                │
//! │      compactor.rs → new SSTable               │
//! │              |                                │
//! │              |  (table count >= threshold?)   │
//! │              v            yes                 │
//! │      size-tiered merge → single SSTable       │
//! │                                               │
//! │ read.rs → active → immutable → SSTables       │
//! │            (newest first, first hit wins)     │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module         | Purpose                                            |
//! |----------------|----------------------------------------------------|
//! | `lib.rs`       | `Store` struct, open/close, stats, `Debug`, `Drop` |
//! | `write.rs`     | `put()`, `delete()`, memtable rotation             |
//! | `read.rs`      | `get()` across memory and disk levels              |
//! | `flush.rs`     | Memtable → SSTable flush, table naming             |
//! | `compactor.rs` | Background worker: async flushes + compaction      |
//! | `config.rs`    | `StoreConfig` and its builder                      |
//! | `error.rs`     | `StoreError`                                       |
//!
//! ## Crash safety
//!
//! Every mutation is appended (and fsynced) to the WAL **before** the
//! memtable update, so an acknowledged write survives a crash. The WAL is
//! truncated at rotation, when its contents are owned by the flush in
//! progress. SSTables are written atomically via temp file + rename;
//! leftover temp files are removed at startup.
//!
//! ## Concurrency
//!
//! A read-write lock guards the memtable pair (active + immutable): reads
//! take the read side, writes and rotation the write side. The SSTable
//! list has its own mutex, and the WAL serialises appends internally. One
//! shared background worker runs asynchronous flushes and compactions,
//! flushes first, so a flush never starves behind a merge. Lock order is
//! always memtable pair → table list.

mod compactor;
mod config;
mod error;
mod flush;
mod read;
mod write;

pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::{Result, StoreError};

use compactor::Compactor;
use log::info;
use memtable::{observe_timestamp, Memtable};
use parking_lot::{Mutex, RwLock};
use sstable::SsTable;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wal::Wal;

/// The memtable pair guarded by the store's read-write lock.
///
/// `active` receives all writes. `immutable` holds the previous active
/// memtable from rotation until its background flush completes; readers
/// consult it so rotated-but-unflushed data stays visible.
pub(crate) struct MemtablePair {
    active: Arc<Memtable>,
    immutable: Option<Arc<Memtable>>,
}

/// State shared between the store's foreground API and the background
/// worker.
pub(crate) struct Shared {
    config: StoreConfig,
    wal: Wal,
    memtables: RwLock<MemtablePair>,
    /// All live tables, oldest first. Lookups iterate in reverse.
    tables: Mutex<Vec<Arc<SsTable>>>,
}

/// A persistent LSM-tree key-value store.
///
/// # Write path
///
/// 1. Append the entry to the WAL (durability).
/// 2. Insert it into the active memtable under the write lock.
/// 3. At `memtable_max_size`, rotate: the active memtable becomes
///    immutable, the WAL is cleared, and a background flush writes the
///    immutable memtable to a new SSTable.
/// 4. After each flush, a size-tiered compaction is scheduled once the
///    table count reaches `compaction_threshold`.
///
/// # Read path
///
/// Active memtable, then immutable memtable, then SSTables newest to
/// oldest. The first hit wins; a tombstone hit means "not present".
///
/// # Recovery
///
/// [`Store::open`] replays the WAL into a fresh memtable and loads every
/// `*.db` file from the SSTable directory, sorted by filename (which
/// equals creation order).
pub struct Store {
    shared: Arc<Shared>,
    compactor: Compactor,
    closed: AtomicBool,
}

impl Store {
    /// Opens (or creates) a store rooted at the configured data
    /// directory, performing full recovery.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors during directory bootstrap, WAL replay, or
    /// table loading, and with `TableError::Corrupt` inside
    /// [`StoreError::Table`] if an SSTable is malformed.
    pub fn open(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(config.data_directory())?;
        fs::create_dir_all(config.sstable_dir())?;
        remove_stale_temp_files(&config.sstable_dir());

        let wal = Wal::open(config.wal_path())?;

        let active = Memtable::new();
        let recovered = wal.recover()?;
        if !recovered.is_empty() {
            info!("recovering {} entries from WAL", recovered.len());
            for entry in recovered {
                // Keep the timestamp clock ahead of everything replayed.
                observe_timestamp(entry.timestamp());
                active.insert(entry);
            }
        }

        let tables = load_sstables(&config.sstable_dir())?;
        if !tables.is_empty() {
            info!("loaded {} SSTables from disk", tables.len());
        }

        let shared = Arc::new(Shared {
            config,
            wal,
            memtables: RwLock::new(MemtablePair {
                active: Arc::new(active),
                immutable: None,
            }),
            tables: Mutex::new(tables),
        });

        let compactor = Compactor::start(Arc::clone(&shared));

        Ok(Self {
            shared,
            compactor,
            closed: AtomicBool::new(false),
        })
    }

    /// Flushes all buffered data to disk and shuts the store down.
    ///
    /// The background worker is drained first (bounded by a 10-second
    /// wait), then whatever remains in the memtable pair is flushed
    /// synchronously and the WAL is closed. Idempotent; also invoked by
    /// `Drop` as a best effort.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Drain queued background work first so a pending flush of the
        // immutable memtable is not repeated by the synchronous pass.
        self.compactor.shutdown();

        {
            let mut pair = self.shared.memtables.write();
            if let Some(immutable) = pair.immutable.clone() {
                flush::flush_memtable(&self.shared, &immutable)?;
                pair.immutable = None;
            }
            if !pair.active.is_empty() {
                flush::flush_memtable(&self.shared, &pair.active)?;
                pair.active = Arc::new(Memtable::new());
            }
        }

        self.shared.wal.close()?;
        Ok(())
    }

    /// Human-readable summary of the store's current shape.
    #[must_use]
    pub fn stats(&self) -> String {
        let mut out = String::from("=== SiltKV Store Statistics ===\n");
        {
            let pair = self.shared.memtables.read();
            out.push_str(&format!(
                "Active memtable: {} entries, ~{} bytes\n",
                pair.active.entry_count(),
                pair.active.size_bytes()
            ));
            if let Some(immutable) = &pair.immutable {
                out.push_str(&format!(
                    "Immutable memtable: {} entries, ~{} bytes\n",
                    immutable.entry_count(),
                    immutable.size_bytes()
                ));
            }
        }
        let tables = self.shared.tables.lock();
        out.push_str(&format!("SSTables: {}\n", tables.len()));
        out
    }

    /// Number of live SSTables.
    #[must_use]
    pub fn sstable_count(&self) -> usize {
        self.shared.tables.lock().len()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pair = self.shared.memtables.read();
        f.debug_struct("Store")
            .field("data_directory", &self.shared.config.data_directory())
            .field("memtable_entries", &pair.active.entry_count())
            .field("memtable_bytes", &pair.active.size_bytes())
            .field("immutable_pending", &pair.immutable.is_some())
            .field("sstables", &self.shared.tables.lock().len())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Best-effort close on drop: remaining memtable data is flushed so it is
/// not stranded in the WAL alone. Errors cannot propagate from `Drop` and
/// are logged instead.
impl Drop for Store {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            if let Err(e) = self.close() {
                log::error!("error while closing store: {}", e);
            }
        }
    }
}

/// Loads every `*.db` table in `dir`, sorted by filename, which by the
/// naming convention, is creation order (oldest first).
fn load_sstables(dir: &Path) -> Result<Vec<Arc<SsTable>>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(flush::TABLE_SUFFIX))
        })
        .collect();
    paths.sort();

    let mut tables = Vec::with_capacity(paths.len());
    for path in &paths {
        tables.push(Arc::new(SsTable::load(path)?));
    }
    Ok(tables)
}

/// Removes `*.db.tmp` leftovers from flushes interrupted by a crash.
fn remove_stale_temp_files(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_tmp = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(".db.tmp"));
            if is_tmp {
                let _ = fs::remove_file(&path);
            }
        }
    }
}

#[cfg(test)]
mod tests;
