use super::*;
use memtable::Entry;
use std::fs;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn values(entries: &[Entry]) -> Vec<(String, Option<String>)> {
    entries
        .iter()
        .map(|e| (e.key().to_owned(), e.value().map(str::to_owned)))
        .collect()
}

// -------------------- Append & recover --------------------

#[test]
fn append_and_recover_in_order() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();

    wal.append(&Entry::new("k1", "v1")).unwrap();
    wal.append(&Entry::new("k2", "v2")).unwrap();
    wal.append(&Entry::tombstone("k1")).unwrap();

    let entries = wal.recover().unwrap();
    assert_eq!(
        values(&entries),
        vec![
            ("k1".into(), Some("v1".into())),
            ("k2".into(), Some("v2".into())),
            ("k1".into(), None),
        ]
    );
    assert!(entries[2].is_tombstone());
}

#[test]
fn recover_preserves_timestamps() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();

    let entry = Entry::new("k", "v");
    wal.append(&entry).unwrap();

    let recovered = wal.recover().unwrap();
    assert_eq!(recovered[0].timestamp(), entry.timestamp());
}

#[test]
fn recover_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();

    // Delete the file behind the WAL's back; recover must not fail.
    fs::remove_file(wal.path()).unwrap();
    assert!(wal.recover().unwrap().is_empty());
}

#[test]
fn recover_empty_wal() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();
    assert!(wal.recover().unwrap().is_empty());
}

#[test]
fn recovery_survives_a_second_reader() {
    // Recovery must not disturb the append handle.
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();

    wal.append(&Entry::new("a", "1")).unwrap();
    assert_eq!(wal.recover().unwrap().len(), 1);

    wal.append(&Entry::new("b", "2")).unwrap();
    assert_eq!(wal.recover().unwrap().len(), 2);
}

// -------------------- Empty values & tombstones --------------------

#[test]
fn empty_value_roundtrips_as_empty_string() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();

    wal.append(&Entry::new("k", "")).unwrap();

    let entries = wal.recover().unwrap();
    assert_eq!(entries[0].value(), Some(""));
    assert!(!entries[0].is_tombstone());
}

#[test]
fn tombstone_roundtrips_with_absent_value() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();

    wal.append(&Entry::tombstone("gone")).unwrap();

    let entries = wal.recover().unwrap();
    assert_eq!(entries[0].value(), None);
    assert!(entries[0].is_tombstone());
}

// -------------------- Escaping --------------------

#[test]
fn pipes_and_backslashes_roundtrip() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();

    let cases = [
        ("key|with|pipes", "value|with|pipes"),
        ("back\\slash", "trailing\\"),
        ("\\|", "|\\"),
        ("\\\\", "||"),
        ("mix\\|ed", "\\|\\\\|"),
        ("|", "\\"),
    ];
    for (k, v) in &cases {
        wal.append(&Entry::new(*k, *v)).unwrap();
    }

    let entries = wal.recover().unwrap();
    assert_eq!(entries.len(), cases.len());
    for (entry, (k, v)) in entries.iter().zip(&cases) {
        assert_eq!(entry.key(), *k);
        assert_eq!(entry.value(), Some(*v));
    }
}

#[test]
fn escape_unescape_are_inverse() {
    let inputs = ["", "plain", "|", "\\", "\\|", "|\\", "a|b\\c", "\\\\||\\"];
    for input in inputs {
        assert_eq!(unescape(&escape(input)), input, "roundtrip of {:?}", input);
    }
}

#[test]
fn split_honours_escaped_pipes() {
    let parts = split_fields("a\\|b|c|1|false");
    assert_eq!(parts, vec!["a\\|b", "c", "1", "false"]);

    // An escaped backslash before a pipe leaves the pipe as a separator.
    let parts = split_fields("a\\\\|b|1|false");
    assert_eq!(parts, vec!["a\\\\", "b", "1", "false"]);
}

// -------------------- Malformed lines --------------------

#[test]
fn malformed_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    let wal = Wal::open(&path).unwrap();

    wal.append(&Entry::new("good1", "v1")).unwrap();
    wal.close().unwrap();

    // Inject garbage between valid records: wrong field count, bad
    // timestamp, bad bool, and a truncated tail (no trailing newline).
    let mut data = fs::read_to_string(&path).unwrap();
    data.push_str("not a record\n");
    data.push_str("k|v|not-a-number|false\n");
    data.push_str("k|v|123|maybe\n");
    fs::write(&path, &data).unwrap();

    let wal = Wal::open(&path).unwrap();
    wal.append(&Entry::new("good2", "v2")).unwrap();

    let entries = wal.recover().unwrap();
    assert_eq!(
        values(&entries),
        vec![
            ("good1".into(), Some("v1".into())),
            ("good2".into(), Some("v2".into())),
        ]
    );
}

#[test]
fn partial_trailing_line_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    let wal = Wal::open(&path).unwrap();

    wal.append(&Entry::new("k", "v")).unwrap();
    wal.close().unwrap();

    // Simulate a crash mid-append: a record cut off before its newline.
    let mut data = fs::read_to_string(&path).unwrap();
    data.push_str("half|writ");
    fs::write(&path, &data).unwrap();

    let wal = Wal::open(&path).unwrap();
    let entries = wal.recover().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key(), "k");
}

// -------------------- Clear & close --------------------

#[test]
fn clear_empties_the_log() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();

    wal.append(&Entry::new("k", "v")).unwrap();
    wal.clear().unwrap();

    assert!(wal.recover().unwrap().is_empty());

    // The WAL stays usable after a clear.
    wal.append(&Entry::new("k2", "v2")).unwrap();
    let entries = wal.recover().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key(), "k2");
}

#[test]
fn append_after_close_fails() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();

    wal.close().unwrap();
    let err = wal.append(&Entry::new("k", "v")).unwrap_err();
    assert!(matches!(err, WalError::Closed));
}

#[test]
fn close_is_idempotent() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log")).unwrap();
    wal.close().unwrap();
    wal.close().unwrap();
}
