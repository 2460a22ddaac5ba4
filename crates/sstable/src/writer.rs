//! Table creation: write to a temp file, backpatch the header, rename.

use bloom::BloomFilter;
use byteorder::{BigEndian, WriteBytesExt};
use memtable::Entry;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::format::{write_index, write_record, HEADER_BYTES};
use crate::{SsTable, TableError};

impl SsTable {
    /// Writes a new SSTable at `path` from `entries` and returns its
    /// handle.
    ///
    /// `entries` must be non-empty; the map's ascending key order is the
    /// on-disk record order. `false_positive_rate` is the target rate for
    /// the embedded bloom filter, as a fraction in `(0, 1)`.
    ///
    /// # Atomicity
    ///
    /// All I/O goes to a sibling `<name>.tmp` file which is fsynced and
    /// renamed over `path` on success. On any error the temp file is
    /// removed and `path` is left untouched.
    ///
    /// # Sparse index
    ///
    /// Every `max(1, n/100)`-th record is inserted into the index with its
    /// absolute file offset; every record for tables under 100 entries.
    pub fn create<P: AsRef<Path>>(
        path: P,
        entries: &BTreeMap<String, Entry>,
        false_positive_rate: f64,
    ) -> Result<SsTable, TableError> {
        let path = path.as_ref();
        let tmp = tmp_path(path);

        let written = write_table(&tmp, entries, false_positive_rate).and_then(|parts| {
            fs::rename(&tmp, path)?;
            Ok(parts)
        });

        match written {
            Ok((bloom, index, data_end)) => Ok(SsTable::from_parts(
                path.to_path_buf(),
                bloom,
                index,
                data_end,
            )),
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                Err(e)
            }
        }
    }
}

/// Sibling temp file: `sstable_x.db` -> `sstable_x.db.tmp`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("sstable"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes header placeholder, data, bloom, and index, then backpatches the
/// header with the real section sizes.
fn write_table(
    tmp: &Path,
    entries: &BTreeMap<String, Entry>,
    false_positive_rate: f64,
) -> Result<(BloomFilter, BTreeMap<String, u64>, u64), TableError> {
    debug_assert!(!entries.is_empty(), "refusing to write an empty sstable");

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp)?;
    let mut w = BufWriter::new(file);

    // Header placeholder; the real sizes are known only after the bloom
    // and index sections are written.
    w.write_i64::<BigEndian>(0)?;
    w.write_i64::<BigEndian>(0)?;

    let mut bloom = BloomFilter::new(entries.len(), false_positive_rate);
    let mut index: BTreeMap<String, u64> = BTreeMap::new();
    let interval = (entries.len() / 100).max(1);

    let mut pos = HEADER_BYTES;
    for (count, entry) in entries.values().enumerate() {
        bloom.add(entry.key());
        if count % interval == 0 {
            index.insert(entry.key().to_owned(), pos);
        }
        pos += write_record(&mut w, entry)?;
    }
    let data_end = pos;

    let mut bloom_bytes = Vec::with_capacity(bloom.serialized_size());
    bloom.write_to(&mut bloom_bytes)?;
    w.write_all(&bloom_bytes)?;

    let index_size = write_index(&mut w, &index)?;

    // Backpatch the header. Seeking flushes the buffered sections first.
    w.seek(SeekFrom::Start(0))?;
    w.write_i64::<BigEndian>(bloom_bytes.len() as i64)?;
    w.write_i64::<BigEndian>(index_size as i64)?;
    w.flush()?;
    w.get_ref().sync_all()?;

    Ok((bloom, index, data_end))
}
