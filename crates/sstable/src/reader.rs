//! Table handle: load, point lookup, full scan, deletion.

use bloom::BloomFilter;
use byteorder::{BigEndian, ReadBytesExt};
use memtable::Entry;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::fs::{self, File};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::format::{read_index, read_record, HEADER_BYTES};
use crate::TableError;

/// Handle to one immutable table file.
///
/// The bloom filter and the sparse index are resident in memory; the data
/// region stays on disk. The handle also caches `data_end = file_len −
/// bloom_size − index_size`, the exclusive upper bound of the data region,
/// so scans never have to re-read the header.
///
/// Handles are shared read-only between the store's lookup path and the
/// compactor; only the compactor (or an explicit teardown) deletes the
/// underlying file.
pub struct SsTable {
    path: PathBuf,
    bloom: BloomFilter,
    /// Sparse index: key -> absolute file offset of the record start.
    index: BTreeMap<String, u64>,
    /// First byte of the data region (right after the header).
    data_offset: u64,
    /// One past the last data byte; the bloom region starts here.
    data_end: u64,
}

impl SsTable {
    pub(crate) fn from_parts(
        path: PathBuf,
        bloom: BloomFilter,
        index: BTreeMap<String, u64>,
        data_end: u64,
    ) -> Self {
        Self {
            path,
            bloom,
            index,
            data_offset: HEADER_BYTES,
            data_end,
        }
    }

    /// Loads an existing table: reads the header, then the bloom and index
    /// sections into memory.
    ///
    /// # Errors
    ///
    /// [`TableError::Corrupt`] if the header sizes do not fit the file,
    /// the bloom filter fails to deserialize, or the index is malformed;
    /// [`TableError::Io`] for plain I/O failures.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        if file_len < HEADER_BYTES {
            return Err(TableError::Corrupt(format!(
                "file is {} bytes, smaller than the {}-byte header",
                file_len, HEADER_BYTES
            )));
        }

        let bloom_size = file.read_i64::<BigEndian>()?;
        let index_size = file.read_i64::<BigEndian>()?;
        if bloom_size < 0
            || index_size < 0
            || bloom_size as u64 + index_size as u64 > file_len - HEADER_BYTES
        {
            return Err(TableError::Corrupt(format!(
                "header sizes (bloom {}, index {}) inconsistent with file length {}",
                bloom_size, index_size, file_len
            )));
        }

        let data_end = file_len - bloom_size as u64 - index_size as u64;

        file.seek(SeekFrom::Start(data_end))?;
        let mut bloom_bytes = vec![0u8; bloom_size as usize];
        std::io::Read::read_exact(&mut file, &mut bloom_bytes)?;
        let bloom = BloomFilter::read_from(&mut bloom_bytes.as_slice())
            .map_err(|e| TableError::Corrupt(format!("bloom filter: {}", e)))?;

        // The reader is now positioned at the index section.
        let mut reader = BufReader::new(file);
        let index = read_index(&mut reader, data_end)?;

        Ok(Self {
            path: path.to_path_buf(),
            bloom,
            index,
            data_offset: HEADER_BYTES,
            data_end,
        })
    }

    /// Point lookup for `key`, tombstones included.
    ///
    /// The bloom filter is consulted first; a negative answer skips the
    /// disk entirely. Otherwise the scan starts at the greatest indexed
    /// key at or below `key` (or at the start of the data region) and
    /// stops as soon as the on-disk keys pass `key` or the data region
    /// ends.
    ///
    /// Opens its own file handle, so concurrent lookups never share a
    /// seek position.
    pub fn get(&self, key: &str) -> Result<Option<Entry>, TableError> {
        if !self.bloom.might_contain(key) {
            return Ok(None);
        }

        let start = self
            .index
            .range::<str, _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .map(|(_, &offset)| offset)
            .unwrap_or(self.data_offset);

        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(start))?;

        let mut pos = start;
        while pos < self.data_end {
            let (entry, len) = read_record(&mut reader)?;
            pos += len;
            match entry.key().cmp(key) {
                Ordering::Equal => return Ok(Some(entry)),
                Ordering::Greater => break,
                Ordering::Less => {}
            }
        }
        Ok(None)
    }

    /// Reads every record in key order. Used by compaction.
    pub fn all_entries(&self) -> Result<Vec<Entry>, TableError> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(self.data_offset))?;

        let mut entries = Vec::new();
        let mut pos = self.data_offset;
        while pos < self.data_end {
            let (entry, len) = read_record(&mut reader)?;
            pos += len;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Removes the table file from disk. Idempotent: a missing file is
    /// not an error.
    pub fn delete(&self) -> Result<(), TableError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the table file on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsTable")
            .field("path", &self.path)
            .field("index_entries", &self.index.len())
            .field("data_bytes", &(self.data_end - self.data_offset))
            .finish()
    }
}
