use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Low timestamp bits reserved for the per-process sequence counter.
///
/// Wall-clock milliseconds collide under load, and "newest wins" is
/// ambiguous on a tie. Entry timestamps are therefore hybrid: the wall
/// clock in the high bits and a monotonic sequence in the low 16 bits, so
/// the order on `(key, timestamp)` is strict within a process lifetime.
const SEQ_BITS: u32 = 16;

/// Last timestamp issued by [`next_timestamp`]. Monotonic per process.
static CLOCK: AtomicI64 = AtomicI64::new(0);

fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Issues the next hybrid timestamp: `max(previous + 1, wall_ms << 16)`.
///
/// Strictly increasing within a process. Also used by the store to name
/// SSTable files so filename order matches creation order.
pub fn next_timestamp() -> i64 {
    let wall = wall_clock_ms() << SEQ_BITS;
    let mut prev = CLOCK.load(AtomicOrdering::Relaxed);
    loop {
        let next = (prev + 1).max(wall);
        match CLOCK.compare_exchange_weak(
            prev,
            next,
            AtomicOrdering::Relaxed,
            AtomicOrdering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(observed) => prev = observed,
        }
    }
}

/// Feeds a recovered timestamp back into the clock.
///
/// Called during WAL replay so that a process restarted under a
/// backwards-stepping system clock never issues a timestamp smaller than
/// one it just recovered.
pub fn observe_timestamp(ts: i64) {
    CLOCK.fetch_max(ts, AtomicOrdering::Relaxed);
}

/// An immutable key-value record.
///
/// Every mutation of the store (a `put` or a `delete`) becomes exactly one
/// `Entry` that flows unchanged through the WAL, the memtable, and
/// eventually an SSTable. A deletion is an entry with `tombstone == true`
/// and no value.
///
/// Entries order by `(key ascending, timestamp descending)`: for the same
/// key, the newest entry sorts first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: String,
    value: Option<String>,
    timestamp: i64,
    tombstone: bool,
}

impl Entry {
    /// Creates a live entry for `key` carrying `value`, stamped with the
    /// current hybrid timestamp.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            timestamp: next_timestamp(),
            tombstone: false,
        }
    }

    /// Creates a tombstone for `key`, stamped with the current hybrid
    /// timestamp.
    pub fn tombstone(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            timestamp: next_timestamp(),
            tombstone: true,
        }
    }

    /// Reconstructs an entry from its serialized parts.
    ///
    /// Used by the WAL and SSTable codecs. A tombstone never carries a
    /// value; the flag wins if the two disagree.
    pub fn from_parts(
        key: impl Into<String>,
        value: Option<String>,
        timestamp: i64,
        tombstone: bool,
    ) -> Self {
        Self {
            key: key.into(),
            value: if tombstone { None } else { value },
            timestamp,
            tombstone,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The entry's value, or `None` for a tombstone.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.tombstone
    }
}

/// `(key asc, timestamp desc)`; value and tombstone flag do not
/// participate in the ordering.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| other.timestamp.cmp(&self.timestamp))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
