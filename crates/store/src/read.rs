//! Read path: `get()` across the memory and disk levels.

use memtable::Entry;

use crate::{Result, Store, StoreError};

impl Store {
    /// Looks up the current value of `key`.
    ///
    /// Consults the active memtable, then the immutable memtable, then
    /// the SSTables from newest to oldest. The first hit wins; a
    /// tombstone hit at any level ends the search with `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidArgument`] for an empty key, or an SSTable
    /// read failure. A missing key is `Ok(None)`, never an error.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key must not be empty"));
        }

        {
            let pair = self.shared.memtables.read();
            if let Some(entry) = pair.active.get(key) {
                return Ok(live_value(entry));
            }
            if let Some(immutable) = &pair.immutable {
                if let Some(entry) = immutable.get(key) {
                    return Ok(live_value(entry));
                }
            }
        }

        let tables = self.shared.tables.lock();
        for table in tables.iter().rev() {
            if let Some(entry) = table.get(key)? {
                return Ok(live_value(entry));
            }
        }
        Ok(None)
    }
}

/// Translates an entry hit: a tombstone means the key is deleted.
fn live_value(entry: Entry) -> Option<String> {
    if entry.is_tombstone() {
        None
    } else {
        entry.value().map(str::to_owned)
    }
}
