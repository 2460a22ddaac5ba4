//! Store configuration.

use std::path::{Path, PathBuf};

/// Configuration for [`Store::open`](crate::Store::open).
///
/// Built with [`StoreConfig::builder`]; every option has a default, so
/// `StoreConfig::default()` opens a store under `./lsm_data`.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    data_directory: PathBuf,
    memtable_max_size: usize,
    sstable_max_size: usize,
    bloom_filter_false_positive_rate: u32,
    compaction_threshold: usize,
}

impl StoreConfig {
    /// Starts a builder with the default settings.
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Root directory holding the WAL and the SSTable directory.
    #[must_use]
    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    /// Path of the write-ahead log: `<data_directory>/wal.log`.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.data_directory.join("wal.log")
    }

    /// Directory holding all SSTable files: `<data_directory>/sstables`.
    #[must_use]
    pub fn sstable_dir(&self) -> PathBuf {
        self.data_directory.join("sstables")
    }

    /// Byte threshold at which the active memtable rotates.
    #[must_use]
    pub fn memtable_max_size(&self) -> usize {
        self.memtable_max_size
    }

    /// Informational only; no behaviour depends on it yet.
    #[must_use]
    pub fn sstable_max_size(&self) -> usize {
        self.sstable_max_size
    }

    /// Target bloom-filter false-positive rate as an integer percentage;
    /// the filter itself is constructed with `rate / 100.0`.
    #[must_use]
    pub fn bloom_filter_false_positive_rate(&self) -> u32 {
        self.bloom_filter_false_positive_rate
    }

    /// Number of SSTables at or above which a compaction is scheduled.
    #[must_use]
    pub fn compaction_threshold(&self) -> usize {
        self.compaction_threshold
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfigBuilder::default().build()
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    data_directory: PathBuf,
    memtable_max_size: usize,
    sstable_max_size: usize,
    bloom_filter_false_positive_rate: u32,
    compaction_threshold: usize,
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("lsm_data"),
            memtable_max_size: 1024 * 1024,
            sstable_max_size: 10 * 1024 * 1024,
            bloom_filter_false_positive_rate: 1,
            compaction_threshold: 4,
        }
    }
}

impl StoreConfigBuilder {
    pub fn data_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_directory = path.into();
        self
    }

    pub fn memtable_max_size(mut self, bytes: usize) -> Self {
        self.memtable_max_size = bytes;
        self
    }

    pub fn sstable_max_size(mut self, bytes: usize) -> Self {
        self.sstable_max_size = bytes;
        self
    }

    pub fn bloom_filter_false_positive_rate(mut self, percent: u32) -> Self {
        self.bloom_filter_false_positive_rate = percent;
        self
    }

    pub fn compaction_threshold(mut self, count: usize) -> Self {
        self.compaction_threshold = count;
        self
    }

    #[must_use]
    pub fn build(self) -> StoreConfig {
        StoreConfig {
            data_directory: self.data_directory,
            memtable_max_size: self.memtable_max_size,
            sstable_max_size: self.sstable_max_size,
            bloom_filter_false_positive_rate: self.bloom_filter_false_positive_rate,
            compaction_threshold: self.compaction_threshold,
        }
    }
}
