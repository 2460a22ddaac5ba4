//! Background worker: asynchronous flushes and size-tiered compaction.
//!
//! One worker thread serves two queues over `crossbeam` channels. Flush
//! jobs always run before queued compactions, so a rotation is never
//! starved behind a long merge. At most one compaction runs at a time by
//! construction (single worker).
//!
//! ## Merge semantics
//!
//! Size-tiered, newest-wins: for each key across all source tables the
//! entry with the largest timestamp is retained, independent of table
//! order. If the winner is a tombstone the key is dropped from the output
//! (tombstone garbage collection). An empty result produces no output
//! table at all; the sources are simply deleted.
//!
//! ## Failure policy
//!
//! A failed flush leaves the immutable memtable in place (readable, and
//! retried at the next rotation). A failed compaction is logged and
//! abandoned without mutating the table list.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use crossbeam::select;
use log::{error, info, warn};
use memtable::{Entry, Memtable};
use parking_lot::Mutex;
use sstable::{SsTable, TableError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::{flush, Shared};

/// How long `shutdown` waits for the worker to drain before abandoning it.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

/// Handle to the background worker owned by the store.
pub(crate) struct Compactor {
    flush_tx: Sender<Arc<Memtable>>,
    compact_tx: Sender<()>,
    shutdown_tx: Sender<()>,
    done_rx: Receiver<()>,
    running: Arc<AtomicBool>,
    threshold: usize,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Compactor {
    /// Spawns the worker thread.
    pub fn start(shared: Arc<Shared>) -> Self {
        let (flush_tx, flush_rx) = channel::unbounded();
        let (compact_tx, compact_rx) = channel::unbounded();
        let (shutdown_tx, shutdown_rx) = channel::bounded(1);
        let (done_tx, done_rx) = channel::bounded(1);
        let running = Arc::new(AtomicBool::new(true));
        let threshold = shared.config.compaction_threshold();

        let worker = Worker {
            shared,
            compact_tx: compact_tx.clone(),
            threshold,
            running: Arc::clone(&running),
        };
        let handle = std::thread::spawn(move || {
            worker.run(flush_rx, compact_rx, shutdown_rx);
            // Dropping this sender is the worker's "done" signal.
            drop(done_tx);
        });

        Self {
            flush_tx,
            compact_tx,
            shutdown_tx,
            done_rx,
            running,
            threshold,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queues an asynchronous flush of a rotated memtable.
    pub fn schedule_flush(&self, memtable: Arc<Memtable>) {
        if self.flush_tx.send(memtable).is_err() {
            // Worker already gone; close() flushes the slot synchronously.
            warn!("background worker unavailable; flush deferred to close");
        }
    }

    /// Queues a compaction if `snapshot` has reached the threshold.
    ///
    /// The job itself re-snapshots the table list when it runs, so
    /// triggers queued in quick succession collapse into one merge of
    /// the full set.
    pub fn maybe_compact(&self, snapshot: Vec<Arc<SsTable>>) {
        if snapshot.len() >= self.threshold {
            let _ = self.compact_tx.send(());
        }
    }

    /// Stops the worker: clears the running flag (checked at compaction
    /// entry), signals shutdown, and waits up to ten seconds for the
    /// queues to drain. On timeout the worker thread is abandoned.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        match self.done_rx.recv_timeout(SHUTDOWN_DRAIN) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.lock().take() {
                    let _ = handle.join();
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "background worker did not drain within {:?}; abandoning it",
                    SHUTDOWN_DRAIN
                );
            }
        }
    }
}

struct Worker {
    shared: Arc<Shared>,
    compact_tx: Sender<()>,
    threshold: usize,
    running: Arc<AtomicBool>,
}

impl Worker {
    fn run(
        &self,
        flush_rx: Receiver<Arc<Memtable>>,
        compact_rx: Receiver<()>,
        shutdown_rx: Receiver<()>,
    ) {
        loop {
            // Flushes always take priority over queued compactions.
            match flush_rx.try_recv() {
                Ok(memtable) => {
                    self.run_flush(memtable);
                    continue;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break,
            }

            select! {
                recv(flush_rx) -> msg => match msg {
                    Ok(memtable) => self.run_flush(memtable),
                    Err(_) => break,
                },
                recv(compact_rx) -> msg => match msg {
                    Ok(()) => self.run_compaction(),
                    Err(_) => break,
                },
                recv(shutdown_rx) -> _ => break,
            }
        }

        // Drain the queues so close() observes settled state. Compactions
        // drained here become no-ops once the running flag is cleared.
        while let Ok(memtable) = flush_rx.try_recv() {
            self.run_flush(memtable);
        }
        while let Ok(()) = compact_rx.try_recv() {
            self.run_compaction();
        }
    }

    fn run_flush(&self, memtable: Arc<Memtable>) {
        // A synchronous flush (rotation catching up, or close) may have
        // emptied the slot already; the queued job is then stale.
        let still_pending = self
            .shared
            .memtables
            .read()
            .immutable
            .as_ref()
            .map_or(false, |m| Arc::ptr_eq(m, &memtable));
        if !still_pending {
            return;
        }

        match flush::flush_memtable(&self.shared, &memtable) {
            Ok(snapshot) => {
                // Empty the slot iff it still holds this exact memtable.
                {
                    let mut pair = self.shared.memtables.write();
                    let same = pair
                        .immutable
                        .as_ref()
                        .map_or(false, |m| Arc::ptr_eq(m, &memtable));
                    if same {
                        pair.immutable = None;
                    }
                }
                if let Some(snapshot) = snapshot {
                    if snapshot.len() >= self.threshold {
                        let _ = self.compact_tx.send(());
                    }
                }
            }
            Err(e) => {
                // Keep the immutable memtable: its data stays readable
                // and the next rotation retries the flush.
                error!("background flush failed: {}", e);
            }
        }
    }

    fn run_compaction(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        // Snapshot the live list at job entry. Triggers that queued up
        // behind an earlier merge see the already-merged list and skip.
        let sources: Vec<Arc<SsTable>> = self.shared.tables.lock().clone();
        if sources.len() < self.threshold {
            return;
        }

        info!("compacting {} SSTables", sources.len());
        match merge_tables(&self.shared, &sources) {
            Ok(merged) => self.install(&sources, merged),
            Err(e) => error!("compaction failed: {}", e),
        }
    }

    /// Swaps the source tables for the merged one (if any) under the list
    /// mutex, then deletes the source files.
    fn install(&self, sources: &[Arc<SsTable>], merged: Option<SsTable>) {
        let produced = merged.is_some();
        {
            let mut tables = self.shared.tables.lock();
            let insert_at = tables
                .iter()
                .position(|t| sources.iter().any(|s| Arc::ptr_eq(t, s)))
                .unwrap_or(tables.len());
            tables.retain(|t| !sources.iter().any(|s| Arc::ptr_eq(t, s)));
            if let Some(table) = merged {
                let at = insert_at.min(tables.len());
                tables.insert(at, Arc::new(table));
            }
        }

        for source in sources {
            if let Err(e) = source.delete() {
                warn!(
                    "failed to delete compacted SSTable {}: {}",
                    source.path().display(),
                    e
                );
            }
        }

        if produced {
            info!("compaction complete: merged {} SSTables into 1", sources.len());
        } else {
            info!(
                "compaction complete: all {} SSTables were tombstones, none written",
                sources.len()
            );
        }
    }
}

/// Size-tiered merge of `sources` into a single new table.
///
/// Returns `None` when tombstone collection leaves nothing to write.
fn merge_tables(
    shared: &Shared,
    sources: &[Arc<SsTable>],
) -> Result<Option<SsTable>, TableError> {
    let mut merged: BTreeMap<String, Entry> = BTreeMap::new();
    for table in sources {
        for entry in table.all_entries()? {
            match merged.get(entry.key()) {
                Some(existing) if existing.timestamp() >= entry.timestamp() => {}
                _ => {
                    merged.insert(entry.key().to_owned(), entry);
                }
            }
        }
    }

    // Tombstone garbage collection: a key whose newest entry is a delete
    // disappears from the output entirely.
    merged.retain(|_, entry| !entry.is_tombstone());

    if merged.is_empty() {
        return Ok(None);
    }

    let path = shared.config.sstable_dir().join(flush::next_table_name());
    let rate = f64::from(shared.config.bloom_filter_false_positive_rate()) / 100.0;
    let table = SsTable::create(&path, &merged, rate)?;
    Ok(Some(table))
}
