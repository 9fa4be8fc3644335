//! Shared harness for ledger integration tests.
//!
//! Entries are written with a payload equal to their index as a
//! little-endian `u32`, so any entry read back from any path can be checked
//! against the index it was stored under.

#![allow(dead_code)] // not every test binary uses every helper

use std::path::{Path, PathBuf};

use chronicle_ledger::{Ledger, MemorySink, is_committed_file_name};
use chronicle_types::{FRAME_HEADER_SIZE, LedgerConfig, decode_frame};

/// Chunk threshold used across scenario tests.
///
/// With an 8-byte file header and 8-byte framed entries, the third
/// committable entry crosses this threshold and completes a chunk.
pub const CHUNK_THRESHOLD: u64 = 30;

/// Committable entries per full chunk at [`CHUNK_THRESHOLD`].
pub const ENTRIES_PER_CHUNK: u64 = 3;

/// Opens a ledger over `dir` with the scenario defaults.
pub fn open_ledger(dir: &Path) -> Ledger<MemorySink> {
    open_ledger_with(dir, CHUNK_THRESHOLD, 2, Vec::new())
}

/// Opens a ledger with explicit threshold, cache bound, and read-only dirs.
pub fn open_ledger_with(
    dir: &Path,
    chunk_threshold: u64,
    read_cache_bound: usize,
    read_only_dirs: Vec<PathBuf>,
) -> Ledger<MemorySink> {
    let config = LedgerConfig::builder()
        .writable_dir(dir)
        .chunk_threshold(chunk_threshold)
        .read_cache_bound(read_cache_bound)
        .read_only_dirs(read_only_dirs)
        .build()
        .expect("valid ledger config");
    Ledger::open(&config, MemorySink::new()).expect("open ledger")
}

/// Payload stored for the entry at `idx`.
pub fn payload(idx: u64) -> [u8; 4] {
    (idx as u32).to_le_bytes()
}

/// Writes the next entry and asserts its assigned index.
pub fn write_next(ledger: &mut Ledger<MemorySink>, committable: bool) -> u64 {
    write_next_with(ledger, committable, false)
}

/// Writes the next entry with an explicit force-chunk request.
pub fn write_next_with(
    ledger: &mut Ledger<MemorySink>,
    committable: bool,
    force_chunk: bool,
) -> u64 {
    let idx = ledger.last_idx() + 1;
    let written = ledger.write_entry(&payload(idx), committable, force_chunk).expect("write entry");
    assert_eq!(written, idx, "ledger assigned an unexpected index");
    idx
}

/// Writes `chunk_count` chunks' worth of committable entries.
pub fn fill_chunks(ledger: &mut Ledger<MemorySink>, chunk_count: u64) {
    for _ in 0..ENTRIES_PER_CHUNK * chunk_count {
        write_next(ledger, true);
    }
}

/// Number of chunk files currently in `dir`.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).expect("read ledger dir").count()
}

/// Number of committed chunk files currently in `dir`.
pub fn committed_file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .expect("read ledger dir")
        .map(|entry| entry.expect("dir entry"))
        .filter(|entry| {
            is_committed_file_name(entry.file_name().to_str().expect("utf-8 file name"))
        })
        .count()
}

/// Asserts that the entry at `idx` reads back with its expected payload.
pub fn assert_entry(ledger: &Ledger<MemorySink>, idx: u64) {
    assert_eq!(
        ledger.read_entry(idx).as_deref(),
        Some(payload(idx).as_slice()),
        "entry {idx} did not read back"
    );
}

/// Asserts that the framed range `[from, to]` decodes to exactly the
/// expected entries, in order.
pub fn assert_framed_range(ledger: &Ledger<MemorySink>, from: u64, to: u64) {
    let framed =
        ledger.read_framed_entries(from, to).unwrap_or_else(|| panic!("range [{from}, {to}]"));
    verify_framed_range(&framed, from, to);
}

/// Walks framed bytes and checks each payload against its index.
pub fn verify_framed_range(framed: &[u8], from: u64, to: u64) {
    let mut cursor = framed;
    let mut idx = from;
    while !cursor.is_empty() {
        let (entry, rest) = decode_frame(cursor).expect("well-formed frame");
        assert_eq!(entry, payload(idx), "frame for entry {idx} has the wrong payload");
        assert_eq!(entry.len() + FRAME_HEADER_SIZE, framed_entry_len());
        cursor = rest;
        idx += 1;
    }
    assert_eq!(idx, to + 1, "framed range held a different number of entries");
}

/// On-disk size of one framed test entry.
pub fn framed_entry_len() -> usize {
    FRAME_HEADER_SIZE + payload(1).len()
}
