mod reader_tests;

use memtable::Entry;
use std::collections::BTreeMap;

/// Builds the ordered entry map `SsTable::create` expects.
pub(crate) fn entry_map(pairs: &[(&str, &str)]) -> BTreeMap<String, Entry> {
    let mut map = BTreeMap::new();
    for (k, v) in pairs {
        let entry = Entry::new(*k, *v);
        map.insert(entry.key().to_owned(), entry);
    }
    map
}
