//! Record and index codecs shared by the writer and reader.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use memtable::Entry;
use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::TableError;

/// Size of the file header: `bloom_size (i64) + index_size (i64)`.
pub const HEADER_BYTES: u64 = 16;

/// Maximum key size accepted during reads (64 KiB). Prevents huge
/// allocations when scanning a corrupt file.
const MAX_KEY_BYTES: i32 = 64 * 1024;

/// Maximum value size accepted during reads (10 MiB).
const MAX_VALUE_BYTES: i32 = 10 * 1024 * 1024;

/// Writes one data record, returning the number of bytes written.
///
/// Layout: `key_len (i32) | key | value_len (i32) | value |
/// timestamp (i64) | tombstone (u8)`. A tombstone writes a zero-length
/// value.
pub(crate) fn write_record<W: Write>(w: &mut W, entry: &Entry) -> std::io::Result<u64> {
    let key = entry.key().as_bytes();
    let value = entry.value().map(str::as_bytes).unwrap_or_default();

    w.write_i32::<BigEndian>(key.len() as i32)?;
    w.write_all(key)?;
    w.write_i32::<BigEndian>(value.len() as i32)?;
    w.write_all(value)?;
    w.write_i64::<BigEndian>(entry.timestamp())?;
    w.write_u8(entry.is_tombstone() as u8)?;

    Ok(4 + key.len() as u64 + 4 + value.len() as u64 + 8 + 1)
}

/// Reads one data record, returning the entry and the number of bytes
/// consumed.
///
/// The tombstone flag is authoritative: a tombstone decodes with an absent
/// value, while a live record with a zero-length value decodes as the
/// empty string.
pub(crate) fn read_record<R: Read>(r: &mut R) -> Result<(Entry, u64), TableError> {
    let key_len = r.read_i32::<BigEndian>()?;
    if !(0..=MAX_KEY_BYTES).contains(&key_len) {
        return Err(TableError::Corrupt(format!(
            "record key length out of range: {}",
            key_len
        )));
    }
    let mut key = vec![0u8; key_len as usize];
    r.read_exact(&mut key)?;
    let key = String::from_utf8(key)
        .map_err(|_| TableError::Corrupt("record key is not valid UTF-8".into()))?;

    let value_len = r.read_i32::<BigEndian>()?;
    if !(0..=MAX_VALUE_BYTES).contains(&value_len) {
        return Err(TableError::Corrupt(format!(
            "record value length out of range: {}",
            value_len
        )));
    }
    let mut value = vec![0u8; value_len as usize];
    r.read_exact(&mut value)?;

    let timestamp = r.read_i64::<BigEndian>()?;
    let tombstone = match r.read_u8()? {
        0 => false,
        1 => true,
        other => {
            return Err(TableError::Corrupt(format!(
                "invalid tombstone flag: {}",
                other
            )))
        }
    };

    let value = if tombstone {
        None
    } else {
        Some(
            String::from_utf8(value)
                .map_err(|_| TableError::Corrupt("record value is not valid UTF-8".into()))?,
        )
    };

    let consumed = 4 + key_len as u64 + 4 + value_len as u64 + 8 + 1;
    Ok((Entry::from_parts(key, value, timestamp, tombstone), consumed))
}

/// Writes the sparse index, returning the number of bytes written.
///
/// Layout: `entry_count (i32)`, then per entry
/// `key_len (i32) | key | offset (i64)`.
pub(crate) fn write_index<W: Write>(
    w: &mut W,
    index: &BTreeMap<String, u64>,
) -> std::io::Result<u64> {
    w.write_i32::<BigEndian>(index.len() as i32)?;
    let mut written = 4u64;
    for (key, offset) in index {
        let key = key.as_bytes();
        w.write_i32::<BigEndian>(key.len() as i32)?;
        w.write_all(key)?;
        w.write_i64::<BigEndian>(*offset as i64)?;
        written += 4 + key.len() as u64 + 8;
    }
    Ok(written)
}

/// Reads the sparse index, validating that every offset points into the
/// data region `[HEADER_BYTES, data_end)`.
pub(crate) fn read_index<R: Read>(
    r: &mut R,
    data_end: u64,
) -> Result<BTreeMap<String, u64>, TableError> {
    let entry_count = r.read_i32::<BigEndian>()?;
    if entry_count < 0 {
        return Err(TableError::Corrupt(format!(
            "negative index entry count: {}",
            entry_count
        )));
    }

    let mut index = BTreeMap::new();
    for _ in 0..entry_count {
        let key_len = r.read_i32::<BigEndian>()?;
        if !(0..=MAX_KEY_BYTES).contains(&key_len) {
            return Err(TableError::Corrupt(format!(
                "index key length out of range: {}",
                key_len
            )));
        }
        let mut key = vec![0u8; key_len as usize];
        r.read_exact(&mut key)?;
        let key = String::from_utf8(key)
            .map_err(|_| TableError::Corrupt("index key is not valid UTF-8".into()))?;

        let offset = r.read_i64::<BigEndian>()?;
        if offset < HEADER_BYTES as i64 || offset as u64 >= data_end {
            return Err(TableError::Corrupt(format!(
                "index offset {} outside data region [{}, {})",
                offset, HEADER_BYTES, data_end
            )));
        }

        index.insert(key, offset as u64);
    }
    Ok(index)
}
