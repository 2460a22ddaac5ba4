use sstable::TableError;
use std::io;
use thiserror::Error;
use wal::WalError;

/// Convenience alias used across the store's public API.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the store's public operations.
///
/// A missing key is **not** an error: `get` returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A caller-supplied argument was rejected (e.g. an empty key).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An I/O failure outside the WAL and SSTable layers (directory
    /// bootstrap, directory listing).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A WAL failure during append, clear, recovery, or close.
    #[error(transparent)]
    Wal(#[from] WalError),

    /// An SSTable failure; `TableError::Corrupt` reports a malformed
    /// table file.
    #[error(transparent)]
    Table(#[from] TableError),
}
