//! # CLI - SiltKV interactive shell
//!
//! A REPL-style command-line interface for the SiltKV store. Reads
//! commands from stdin, executes them against the store, and prints
//! results to stdout. Works both interactively and scripted (pipe
//! commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! SET key value      Insert or update a key-value pair
//! GET key            Look up a key (prints value or "(nil)")
//! DEL key            Delete a key (writes a tombstone)
//! STATS              Print store statistics
//! EXIT / QUIT        Flush, close, and leave
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! SILT_DATA_DIR      Data directory                  (default: "lsm_data")
//! SILT_MEMTABLE_KB   Memtable rotation size in KiB   (default: 1024)
//! SILT_BLOOM_FPR     Bloom false-positive rate, %    (default: 1)
//! SILT_COMPACT_AT    Table count triggering merge    (default: 4)
//! ```
//!
//! Set `RUST_LOG=info` to watch flushes and compactions happen.
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! SiltKV started (dir=lsm_data, memtable=1024KiB, bloom_fpr=1%, compact_at=4)
//! > SET name Alice
//! OK
//! > GET name
//! Alice
//! > DEL name
//! OK
//! > GET name
//! (nil)
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use std::io::{self, BufRead, Write};
use store::{Store, StoreConfig};

/// Reads a configuration value from the environment, falling back to
/// `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    env_logger::init();

    let data_dir = env_or("SILT_DATA_DIR", "lsm_data");
    let memtable_kb: usize = env_or("SILT_MEMTABLE_KB", "1024").parse().unwrap_or(1024);
    let bloom_fpr: u32 = env_or("SILT_BLOOM_FPR", "1").parse().unwrap_or(1);
    let compact_at: usize = env_or("SILT_COMPACT_AT", "4").parse().unwrap_or(4);

    let config = StoreConfig::builder()
        .data_directory(&data_dir)
        .memtable_max_size(memtable_kb * 1024)
        .bloom_filter_false_positive_rate(bloom_fpr)
        .compaction_threshold(compact_at)
        .build();
    let store = Store::open(config)?;

    println!(
        "SiltKV started (dir={}, memtable={}KiB, bloom_fpr={}%, compact_at={})",
        data_dir, memtable_kb, bloom_fpr, compact_at
    );
    println!("Commands: SET key value | GET key | DEL key | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "SET" => {
                    if let Some(key) = parts.next() {
                        let value: String = parts.collect::<Vec<&str>>().join(" ");
                        match store.put(key, &value) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR {}", e),
                        }
                    } else {
                        println!("ERR usage: SET key value");
                    }
                }
                "GET" => match parts.next() {
                    Some(key) => match store.get(key) {
                        Ok(Some(value)) => println!("{}", value),
                        Ok(None) => println!("(nil)"),
                        Err(e) => println!("ERR {}", e),
                    },
                    None => println!("ERR usage: GET key"),
                },
                "DEL" => match parts.next() {
                    Some(key) => match store.delete(key) {
                        Ok(()) => println!("OK"),
                        Err(e) => println!("ERR {}", e),
                    },
                    None => println!("ERR usage: DEL key"),
                },
                "STATS" => print!("{}", store.stats()),
                "EXIT" | "QUIT" => break,
                other => println!("ERR unknown command: {}", other),
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    store.close()?;
    println!("bye");
    Ok(())
}
