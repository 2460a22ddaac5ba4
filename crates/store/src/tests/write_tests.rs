use super::helpers::{config, flushy_config, wait_until};
use crate::{Store, StoreError};
use anyhow::Result;
use std::time::Duration;
use tempfile::tempdir;

// --------------------- Basic put / get / delete ---------------------

#[test]
fn basic_put_and_get() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;

    store.put("user:1", "Alice")?;
    store.put("user:2", "Bob")?;

    assert_eq!(store.get("user:1")?.as_deref(), Some("Alice"));
    assert_eq!(store.get("user:2")?.as_deref(), Some("Bob"));
    assert_eq!(store.get("user:3")?, None);
    Ok(())
}

#[test]
fn overwrite_returns_latest_value() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;

    store.put("k", "v1")?;
    store.put("k", "v2")?;
    assert_eq!(store.get("k")?.as_deref(), Some("v2"));
    Ok(())
}

#[test]
fn delete_hides_the_key() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;

    store.put("k", "v")?;
    store.delete("k")?;
    assert_eq!(store.get("k")?, None);
    Ok(())
}

#[test]
fn update_delete_reinsert_sequence() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;

    store.put("k", "v1")?;
    store.put("k", "v2")?;
    store.delete("k")?;
    assert_eq!(store.get("k")?, None);

    store.put("k", "v3")?;
    assert_eq!(store.get("k")?.as_deref(), Some("v3"));
    Ok(())
}

#[test]
fn delete_of_never_written_key_is_fine() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;

    store.delete("ghost")?;
    assert_eq!(store.get("ghost")?, None);
    Ok(())
}

// --------------------- Argument validation ---------------------

#[test]
fn empty_key_is_rejected_everywhere() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;

    assert!(matches!(
        store.put("", "v"),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.get(""),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.delete(""),
        Err(StoreError::InvalidArgument(_))
    ));
    Ok(())
}

#[test]
fn empty_value_is_a_real_value() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;

    store.put("k", "")?;
    assert_eq!(store.get("k")?.as_deref(), Some(""));
    Ok(())
}

// --------------------- Rotation & flush ---------------------

#[test]
fn bulk_insert_triggers_flush() -> Result<()> {
    // memtable_max_size = 1024 forces rotations during the bulk insert.
    let dir = tempdir()?;
    let cfg = flushy_config(dir.path(), 1024, 100);
    let store = Store::open(cfg)?;

    for i in 0..100 {
        store.put(&format!("key:{}", i), &format!("value:{}", i))?;
    }

    assert!(
        wait_until(Duration::from_secs(1), || store.sstable_count() >= 1),
        "expected at least one SSTable after bulk insert"
    );
    assert_eq!(store.get("key:50")?.as_deref(), Some("value:50"));
    assert_eq!(store.get("key:99")?.as_deref(), Some("value:99"));
    Ok(())
}

#[test]
fn reads_stay_consistent_across_rotations() -> Result<()> {
    // Every write rotates; each must still be readable immediately,
    // whether it currently lives in the active memtable, the immutable
    // memtable, or an SSTable.
    let dir = tempdir()?;
    let store = Store::open(flushy_config(dir.path(), 1, 100))?;

    for i in 0..20 {
        let key = format!("k{}", i);
        store.put(&key, &format!("v{}", i))?;
        assert_eq!(store.get(&key)?.as_deref(), Some(format!("v{}", i).as_str()));
    }

    // And everything remains readable at the end.
    for i in 0..20 {
        assert_eq!(
            store.get(&format!("k{}", i))?.as_deref(),
            Some(format!("v{}", i).as_str())
        );
    }
    Ok(())
}

// --------------------- Close ---------------------

#[test]
fn close_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;
    store.put("k", "v")?;

    store.close()?;
    store.close()?;
    Ok(())
}

#[test]
fn put_after_close_fails() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;

    store.close()?;
    assert!(store.put("k", "v").is_err());
    Ok(())
}

// --------------------- Stats ---------------------

#[test]
fn stats_reports_memtable_and_tables() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(config(dir.path()))?;

    store.put("k", "v")?;
    let stats = store.stats();
    assert!(stats.contains("Active memtable: 1 entries"));
    assert!(stats.contains("SSTables: 0"));
    Ok(())
}
