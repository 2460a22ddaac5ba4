use crate::{Store, StoreConfig};
use std::path::Path;
use std::time::{Duration, Instant};

/// Default-ish config rooted in a scratch directory.
pub(crate) fn config(dir: &Path) -> StoreConfig {
    StoreConfig::builder().data_directory(dir.join("db")).build()
}

/// Config with a tiny memtable so every write (or every few writes)
/// triggers a rotation, plus an explicit compaction threshold.
pub(crate) fn flushy_config(
    dir: &Path,
    memtable_max_size: usize,
    compaction_threshold: usize,
) -> StoreConfig {
    StoreConfig::builder()
        .data_directory(dir.join("db"))
        .memtable_max_size(memtable_max_size)
        .compaction_threshold(compaction_threshold)
        .build()
}

/// Counts the `*.db` table files currently on disk.
pub(crate) fn table_files_on_disk(config: &StoreConfig) -> usize {
    std::fs::read_dir(config.sstable_dir())
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().ends_with(".db"))
                .count()
        })
        .unwrap_or(0)
}

/// Waits until no background flush is pending (the immutable slot is
/// empty), i.e. every rotated memtable has reached disk.
pub(crate) fn wait_for_flush_settled(store: &Store) -> bool {
    wait_until(Duration::from_secs(2), || {
        store.shared.memtables.read().immutable.is_none()
    })
}

/// Polls `cond` every 10ms until it holds or `timeout` expires. Returns
/// the final answer, so callers can `assert!` on it.
pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
