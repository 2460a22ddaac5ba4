//! # SSTable - Sorted String Table
//!
//! Immutable, on-disk storage files for the SiltKV store.
//!
//! When the in-memory [`memtable::Memtable`] exceeds its size threshold the
//! store flushes it to disk as an SSTable. SSTables are *write-once,
//! read-many*: once created they are never modified, only replaced by
//! compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ HEADER (16 bytes)                                             │
//! │                                                               │
//! │ bloom_size (i64) | index_size (i64)                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │ DATA SECTION (records in ascending key order)                 │
//! │                                                               │
//! │ key_len (i32) | key | value_len (i32) | value                 │
//! │ timestamp (i64) | tombstone (u8)                              │
//! │                                                               │
//! │ ... repeated for each entry ...                               │
//! ├───────────────────────────────────────────────────────────────┤
//! │ BLOOM SECTION (serialized BloomFilter, bloom_size bytes)      │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX SECTION (sparse key -> offset map, index_size bytes)    │
//! │                                                               │
//! │ entry_count (i32)                                             │
//! │ key_len (i32) | key | offset (i64)   ... repeated ...         │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are **big-endian**. Offsets in the index are absolute file
//! offsets of record starts. The header is written as a placeholder first
//! and backpatched once the bloom and index sizes are known; the end of
//! the data section is always `file_len − bloom_size − index_size`, cached
//! on the handle at load time.
//!
//! ## Durability
//!
//! A table is written to a sibling `<name>.tmp` file, fsynced, and
//! atomically renamed into place. A crash mid-write leaves only a `.tmp`
//! file, which the store removes on startup.
//!
//! ## Lookups
//!
//! A loaded handle keeps the bloom filter and the sparse index (one key
//! every ~100 records) resident; the data stays on disk. A point lookup
//! checks the bloom filter, seeks to the greatest indexed key at or below
//! the target, and scans forward until the key is found or passed. Every
//! lookup opens its own file handle, so concurrent readers never contend
//! on a seek position.

mod format;
mod reader;
mod writer;

pub use format::HEADER_BYTES;
pub use reader::SsTable;

use std::io;
use thiserror::Error;

/// Errors surfaced by SSTable creation and reads.
#[derive(Debug, Error)]
pub enum TableError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The file's contents are inconsistent: header sizes that do not fit
    /// the file, index offsets outside the data region, an unreadable
    /// bloom filter, or a malformed record.
    #[error("corrupt sstable: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests;
