//! Flushing a memtable to a new SSTable.

use log::info;
use memtable::Memtable;
use sstable::SsTable;
use std::sync::Arc;

use crate::{Result, Shared};

/// Filename suffix of every live table file.
pub(crate) const TABLE_SUFFIX: &str = ".db";

/// Writes `memtable` out as a new SSTable and appends the handle to the
/// shared table list.
///
/// Returns a snapshot of the table list taken right after the append
/// (the input for the caller's compaction decision), or `None` when the
/// memtable was empty and nothing was written.
///
/// Used by three paths: the background worker (asynchronous flush after
/// rotation), rotation itself (synchronous flush of a still-pending
/// immutable memtable), and `close`.
pub(crate) fn flush_memtable(
    shared: &Shared,
    memtable: &Memtable,
) -> Result<Option<Vec<Arc<SsTable>>>> {
    let entries = memtable.snapshot();
    if entries.is_empty() {
        return Ok(None);
    }

    let path = shared.config.sstable_dir().join(next_table_name());
    info!(
        "flushing memtable: {} entries -> {}",
        entries.len(),
        path.display()
    );

    let rate = f64::from(shared.config.bloom_filter_false_positive_rate()) / 100.0;
    let table = SsTable::create(&path, &entries, rate)?;

    let mut tables = shared.tables.lock();
    tables.push(Arc::new(table));
    Ok(Some(tables.clone()))
}

/// Next table filename: `sstable_<timestamp>.db`.
///
/// The timestamp is the 20-digit zero-padded hybrid clock value (wall
/// clock in the high bits, per-process sequence in the low bits), so
/// lexicographic filename order equals numeric order equals creation
/// order, and two flushes in the same millisecond still get distinct,
/// correctly ordered names.
pub(crate) fn next_table_name() -> String {
    format!("sstable_{:020}{}", memtable::next_timestamp(), TABLE_SUFFIX)
}
