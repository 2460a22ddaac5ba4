//! # WAL - Write-Ahead Log
//!
//! Provides crash-safe durability for the SiltKV store.
//!
//! Every mutation (`put` or `delete`) is appended to the WAL **before** the
//! corresponding memtable update. On restart the WAL is replayed to
//! reconstruct the memtable, guaranteeing that no acknowledged write is
//! lost. The log is truncated when the memtable rotates; at that point
//! its contents are owned by the flush in progress.
//!
//! ## Record Format
//!
//! One text line per entry, newline-terminated:
//!
//! ```text
//! <escaped_key>|<escaped_value>|<timestamp>|<tombstone>
//! ```
//!
//! `escape` replaces `\` with `\\` and `|` with `\|`; a tombstone
//! serializes its value as the empty string. Field splitting honours the
//! escaping, so keys and values may contain both `\` and `|` in any
//! combination. A malformed line is skipped with a warning during
//! recovery and never aborts the replay, because a crash mid-append
//! legitimately leaves a partial line at the tail.
//!
//! ## Example
//!
//! ```rust,no_run
//! use memtable::Entry;
//! use wal::Wal;
//!
//! let wal = Wal::open("wal.log").unwrap();
//! wal.append(&Entry::new("hello", "world")).unwrap();
//! for entry in wal.recover().unwrap() {
//!     println!("{:?}", entry);
//! }
//! ```

use log::warn;
use memtable::Entry;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The WAL was closed and can no longer accept appends.
    #[error("wal is closed")]
    Closed,
}

/// Append-only durability log.
///
/// Appends are serialised by an internal mutex and flushed (including
/// `fdatasync`) before returning, so an acknowledged mutation survives a
/// process crash. Recovery reads the file independently of the write
/// handle.
pub struct Wal {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl Wal {
    /// Opens (or creates) the WAL file in append mode, creating parent
    /// directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = open_writer(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Serializes `entry` to one line and appends it durably.
    ///
    /// The record is flushed and synced before this returns; concurrent
    /// callers are serialised on the internal lock.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Closed`] after [`close`](Wal::close), or the
    /// underlying I/O error. A failed append may leave a partial line at
    /// the tail of the file; recovery tolerates it.
    pub fn append(&self, entry: &Entry) -> Result<(), WalError> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(WalError::Closed)?;
        writer.write_all(serialize(entry).as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Replays the log, yielding entries in on-disk order.
    ///
    /// Malformed lines are logged and skipped. A missing file yields no
    /// entries.
    pub fn recover(&self) -> Result<Vec<Entry>, WalError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            match deserialize(&line) {
                Some(entry) => entries.push(entry),
                None => warn!("skipping malformed WAL line: {:?}", line),
            }
        }
        Ok(entries)
    }

    /// Empties the log: closes the current handle, deletes the file, and
    /// reopens it fresh. Atomic from the caller's perspective: the lock
    /// is held for the whole sequence.
    pub fn clear(&self) -> Result<(), WalError> {
        let mut guard = self.writer.lock();
        if let Some(mut writer) = guard.take() {
            writer.flush()?;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *guard = Some(open_writer(&self.path)?);
        Ok(())
    }

    /// Flushes and releases the file handle. Subsequent appends fail with
    /// [`WalError::Closed`]. Idempotent.
    pub fn close(&self) -> Result<(), WalError> {
        let mut guard = self.writer.lock();
        if let Some(mut writer) = guard.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Path of the log file on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_writer(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

// ---- Line codec ----

fn serialize(entry: &Entry) -> String {
    format!(
        "{}|{}|{}|{}",
        escape(entry.key()),
        entry.value().map(escape).unwrap_or_default(),
        entry.timestamp(),
        entry.is_tombstone()
    )
}

fn deserialize(line: &str) -> Option<Entry> {
    let parts = split_fields(line);
    if parts.len() != 4 {
        return None;
    }

    let timestamp: i64 = parts[2].parse().ok()?;
    let tombstone = match parts[3].as_str() {
        "true" => true,
        "false" => false,
        _ => return None,
    };

    let key = unescape(&parts[0]);
    // A tombstone's empty value field means "no value"; for a live entry
    // the empty field is a genuine empty-string value.
    let value = if parts[1].is_empty() && tombstone {
        None
    } else {
        Some(unescape(&parts[1]))
    };

    Some(Entry::from_parts(key, value, timestamp, tombstone))
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            _ => out.push(c),
        }
    }
    out
}

/// Exact inverse of [`escape`] on its image; escape pairs other than `\\`
/// and `\|` pass through untouched.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\\' | '|')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits a record line on pipes that are not escaped, i.e. not preceded
/// by an odd run of backslashes. The returned fields are still escaped.
fn split_fields(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == '|' {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests;
