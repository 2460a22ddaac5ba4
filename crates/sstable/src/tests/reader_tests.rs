use super::entry_map;
use crate::{SsTable, TableError};
use anyhow::Result;
use memtable::Entry;
use std::collections::BTreeMap;
use std::fs;
use tempfile::tempdir;

// -------------------- Load & point lookup --------------------

#[test]
fn load_roundtrips_every_entry() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.db");

    let entries = entry_map(&[("a", "1"), ("b", "2"), ("c", "3")]);
    SsTable::create(&path, &entries, 0.01)?;

    let table = SsTable::load(&path)?;
    for (key, expected) in &entries {
        let got = table.get(key)?.expect("key must be present");
        assert_eq!(got.value(), expected.value());
        assert_eq!(got.timestamp(), expected.timestamp());
    }
    assert!(table.get("absent")?.is_none());
    assert!(table.get("zzz")?.is_none());
    Ok(())
}

#[test]
fn sparse_index_covers_unindexed_keys() -> Result<()> {
    // 250 entries -> index interval 2, so half the keys are not in the
    // sparse index and must be found by the forward scan from the floor.
    let dir = tempdir()?;
    let path = dir.path().join("t.db");

    let mut entries = BTreeMap::new();
    for i in 0..250 {
        let e = Entry::new(format!("key:{:03}", i), format!("value:{}", i));
        entries.insert(e.key().to_owned(), e);
    }
    SsTable::create(&path, &entries, 0.01)?;

    let table = SsTable::load(&path)?;
    for i in 0..250 {
        let got = table.get(&format!("key:{:03}", i))?.unwrap();
        assert_eq!(got.value(), Some(format!("value:{}", i).as_str()));
    }
    // Keys that fall between existing ones come back absent.
    assert!(table.get("key:100a")?.is_none());
    assert!(table.get("key")?.is_none());
    Ok(())
}

#[test]
fn empty_value_roundtrips_as_empty_string() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.db");

    SsTable::create(&path, &entry_map(&[("k", "")]), 0.01)?;

    let table = SsTable::load(&path)?;
    let got = table.get("k")?.unwrap();
    assert_eq!(got.value(), Some(""));
    assert!(!got.is_tombstone());
    Ok(())
}

#[test]
fn tombstone_roundtrips_after_load() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.db");

    let mut entries = entry_map(&[("a", "v")]);
    let dead = Entry::tombstone("b");
    entries.insert(dead.key().to_owned(), dead);
    SsTable::create(&path, &entries, 0.01)?;

    let table = SsTable::load(&path)?;
    assert!(table.get("b")?.unwrap().is_tombstone());
    assert!(!table.get("a")?.unwrap().is_tombstone());
    Ok(())
}

// -------------------- Full scan --------------------

#[test]
fn all_entries_in_key_order() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.db");

    let entries = entry_map(&[("c", "3"), ("a", "1"), ("b", "2")]);
    SsTable::create(&path, &entries, 0.01)?;

    let table = SsTable::load(&path)?;
    let all = table.all_entries()?;
    let keys: Vec<&str> = all.iter().map(Entry::key).collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
    Ok(())
}

// -------------------- Deletion --------------------

#[test]
fn delete_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.db");

    let table = SsTable::create(&path, &entry_map(&[("k", "v")]), 0.01)?;
    table.delete()?;
    assert!(!path.exists());
    table.delete()?; // second delete is a no-op
    Ok(())
}

// -------------------- Corruption --------------------

#[test]
fn file_smaller_than_header_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");
    fs::write(&path, b"short").unwrap();

    assert!(matches!(
        SsTable::load(&path),
        Err(TableError::Corrupt(_))
    ));
}

#[test]
fn header_sizes_exceeding_file_are_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.db");

    SsTable::create(&path, &entry_map(&[("k", "v")]), 0.01)?;

    // Overwrite bloom_size with a value larger than the whole file.
    let mut bytes = fs::read(&path)?;
    bytes[..8].copy_from_slice(&(1i64 << 40).to_be_bytes());
    fs::write(&path, &bytes)?;

    assert!(matches!(SsTable::load(&path), Err(TableError::Corrupt(_))));
    Ok(())
}

#[test]
fn zeroed_header_is_corrupt() -> Result<()> {
    // bloom_size = index_size = 0 leaves nothing to deserialize the bloom
    // filter from; load must fail rather than panic.
    let dir = tempdir()?;
    let path = dir.path().join("t.db");

    SsTable::create(&path, &entry_map(&[("k", "v")]), 0.01)?;

    let mut bytes = fs::read(&path)?;
    bytes[..16].copy_from_slice(&[0u8; 16]);
    fs::write(&path, &bytes)?;

    assert!(SsTable::load(&path).is_err());
    Ok(())
}
