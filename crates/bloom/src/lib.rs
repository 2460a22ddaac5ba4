//! # Bloom Filter
//!
//! A space-efficient probabilistic data structure for set membership
//! testing.
//!
//! A bloom filter can tell you with certainty that a key is **not** in the
//! set (no false negatives), but may occasionally report that a key **is**
//! in the set when it isn't (false positives). The false positive rate
//! depends on the number of bits and hash functions used.
//!
//! ## Usage in SiltKV
//!
//! Each SSTable embeds a bloom filter built from its keys. During point
//! lookups the store checks the bloom filter first; if it says "not
//! present", the SSTable is skipped entirely, avoiding index lookups and
//! disk I/O.
//!
//! ## Stability
//!
//! The filter is persisted inside every SSTable, which makes both the hash
//! function and the serialized layout part of the on-disk format. Changing
//! either is a breaking format change; the bitset representation carries a
//! version byte for that reason.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new(1000, 0.01);
//! bf.add("hello");
//! assert!(bf.might_contain("hello"));
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Version tag of the serialized bitset representation.
const BITSET_VERSION: u8 = 1;

/// Safety cap on the serialized bitset: a filter larger than this is
/// treated as corrupt rather than allocated.
const MAX_BITSET_WORDS: u32 = 16 * 1024 * 1024; // 128 MiB of words

/// A bloom filter backed by a bit vector with `k` independent hash
/// functions derived from seeds `0..k`.
pub struct BloomFilter {
    /// The bit vector, packed into 64-bit words.
    words: Vec<u64>,
    /// Number of addressable bits (`m`).
    bit_set_size: i32,
    /// Number of hash functions (`k`).
    num_hash_functions: i32,
}

impl BloomFilter {
    /// Creates a bloom filter sized for `expected_items` insertions with
    /// the given target `false_positive_rate`.
    ///
    /// Sizing follows the standard formulas `m = ⌈−n·ln p / (ln 2)²⌉` and
    /// `k = max(1, round(m/n · ln 2))`.
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 or `false_positive_rate` is not in
    /// `(0, 1)`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );

        let n = expected_items as f64;
        let m = (-n * false_positive_rate.ln() / std::f64::consts::LN_2.powi(2)).ceil();
        let m = (m as i64).clamp(1, i32::MAX as i64) as i32;

        let k = (m as f64 / n * std::f64::consts::LN_2).round() as i32;
        let k = k.max(1);

        let word_count = (m as usize + 63) / 64;

        Self {
            words: vec![0u64; word_count],
            bit_set_size: m,
            num_hash_functions: k,
        }
    }

    /// Inserts a key into the bloom filter.
    pub fn add(&mut self, key: &str) {
        for seed in 0..self.num_hash_functions {
            let idx = self.bit_index(key, seed);
            self.set_bit(idx);
        }
    }

    /// Returns `true` if the key **might** be in the set, `false` if it is
    /// **definitely not** in the set.
    #[must_use]
    pub fn might_contain(&self, key: &str) -> bool {
        for seed in 0..self.num_hash_functions {
            let idx = self.bit_index(key, seed);
            if !self.get_bit(idx) {
                return false;
            }
        }
        true
    }

    /// Number of addressable bits (`m`).
    #[must_use]
    pub fn bit_set_size(&self) -> i32 {
        self.bit_set_size
    }

    /// Number of hash functions (`k`).
    #[must_use]
    pub fn num_hash_functions(&self) -> i32 {
        self.num_hash_functions
    }

    /// Size of the serialized filter in bytes.
    ///
    /// Layout: `bit_set_size(i32) + num_hash_functions(i32) + version(u8)
    /// + word_count(u32) + words(u64 each)`, all big-endian.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        4 + 4 + 1 + 4 + self.words.len() * 8
    }

    /// Serializes the filter to a writer.
    ///
    /// Wire format (all big-endian):
    /// ```text
    /// [bit_set_size: i32][num_hash_functions: i32]
    /// [version: u8][word_count: u32][words: u64 ...]
    /// ```
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_i32::<BigEndian>(self.bit_set_size)?;
        w.write_i32::<BigEndian>(self.num_hash_functions)?;
        w.write_u8(BITSET_VERSION)?;
        w.write_u32::<BigEndian>(self.words.len() as u32)?;
        for word in &self.words {
            w.write_u64::<BigEndian>(*word)?;
        }
        Ok(())
    }

    /// Deserializes a filter previously written by [`write_to`].
    ///
    /// [`write_to`]: BloomFilter::write_to
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let bit_set_size = r.read_i32::<BigEndian>()?;
        let num_hash_functions = r.read_i32::<BigEndian>()?;

        let version = r.read_u8()?;
        if version != BITSET_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported bloom bitset version: {}", version),
            ));
        }

        let word_count = r.read_u32::<BigEndian>()?;
        if word_count > MAX_BITSET_WORDS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bloom filter too large: {} words", word_count),
            ));
        }
        if bit_set_size <= 0 || num_hash_functions <= 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bloom filter parameters must be positive",
            ));
        }

        let mut words = vec![0u64; word_count as usize];
        for word in &mut words {
            *word = r.read_u64::<BigEndian>()?;
        }

        Ok(Self {
            words,
            bit_set_size,
            num_hash_functions,
        })
    }

    // ---- Internal helpers ----

    /// Maps a key and seed to a bit index: `|hash mod m|`.
    fn bit_index(&self, key: &str, seed: i32) -> usize {
        (hash(key, seed) % self.bit_set_size).unsigned_abs() as usize
    }

    fn set_bit(&mut self, idx: usize) {
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    fn get_bit(&self, idx: usize) -> bool {
        (self.words[idx / 64] >> (idx % 64)) & 1 == 1
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("bit_set_size", &self.bit_set_size)
            .field("num_hash_functions", &self.num_hash_functions)
            .field("words", &self.words.len())
            .finish()
    }
}

/// Seeded 32-bit hash over the key's bytes.
///
/// `h = 31·h + byte` with signed wrapping arithmetic, then a murmur-style
/// finaliser. Persisted filters depend on this exact function; it must not
/// change between processes or releases.
fn hash(key: &str, seed: i32) -> i32 {
    let mut h = seed;
    for &b in key.as_bytes() {
        h = h.wrapping_mul(31).wrapping_add(b as i32);
    }

    let mut h = h as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    h as i32
}
