//! Chunk boundary behaviour: threshold sealing, non-committable entries,
//! force-chunk, and reads across chunk seams.

mod common;

use chronicle_test_utils::TestDir;
use common::*;

#[test]
fn committable_entries_below_threshold_stay_in_one_file() {
    let dir = TestDir::new();
    let mut ledger = open_ledger(dir.path());

    for _ in 0..ENTRIES_PER_CHUNK - 1 {
        write_next(&mut ledger, true);
    }
    assert_eq!(file_count(dir.path()), 1);
}

#[test]
fn non_committable_entries_do_not_trigger_chunking() {
    let dir = TestDir::new();
    let mut ledger = open_ledger(dir.path());

    for _ in 0..ENTRIES_PER_CHUNK - 1 {
        write_next(&mut ledger, true);
    }
    // Push the file size past the threshold with non-committable entries
    write_next(&mut ledger, false);
    write_next(&mut ledger, false);
    assert_eq!(file_count(dir.path()), 1);

    // The next committable entry completes the chunk; the write after that
    // lands in a fresh file
    write_next(&mut ledger, true);
    assert_eq!(file_count(dir.path()), 1);
    write_next(&mut ledger, false);
    assert_eq!(file_count(dir.path()), 2);
}

#[test]
fn committable_entries_chunk_at_regular_intervals() {
    let dir = TestDir::new();
    let mut ledger = open_ledger(dir.path());

    let chunk_count = 10;
    fill_chunks(&mut ledger, chunk_count);
    // The final chunk is complete but its successor is only created on the
    // next write, so exactly chunk_count files exist
    assert_eq!(file_count(dir.path()), chunk_count as usize);

    write_next(&mut ledger, true);
    assert_eq!(file_count(dir.path()), chunk_count as usize + 1);
}

#[test]
fn force_chunk_seals_early_on_next_write() {
    let dir = TestDir::new();
    let mut ledger = open_ledger(dir.path());
    fill_chunks(&mut ledger, 1);

    // Start a fresh chunk with a single entry, far below the threshold
    write_next(&mut ledger, true);
    let files_before = file_count(dir.path());

    // A committable entry with force_chunk completes the chunk in place
    write_next_with(&mut ledger, true, true);
    assert_eq!(file_count(dir.path()), files_before);

    // The next write - committable or not - lands in a fresh chunk
    write_next(&mut ledger, false);
    assert_eq!(file_count(dir.path()), files_before + 1);

    // force_chunk on a non-committable write has no effect
    let files_before = file_count(dir.path());
    write_next_with(&mut ledger, false, true);
    write_next(&mut ledger, false);
    assert_eq!(file_count(dir.path()), files_before);
}

#[test]
fn reads_resolve_across_all_chunks() {
    let dir = TestDir::new();
    let mut ledger = open_ledger(dir.path());
    fill_chunks(&mut ledger, 4);
    write_next(&mut ledger, false);
    let last_idx = ledger.last_idx();
    let end_of_first_chunk = ENTRIES_PER_CHUNK;

    // Within bounds, every position resolves: first entry, chunk seams, tail
    assert_entry(&ledger, 1);
    assert_entry(&ledger, end_of_first_chunk);
    assert_entry(&ledger, end_of_first_chunk + 1);
    assert_entry(&ledger, last_idx);

    // Index 0 and the future do not
    assert!(ledger.read_entry(0).is_none());
    assert!(ledger.read_entry(last_idx + 1).is_none());
}

#[test]
fn framed_ranges_stitch_across_chunk_seams() {
    let dir = TestDir::new();
    let mut ledger = open_ledger(dir.path());
    fill_chunks(&mut ledger, 4);
    write_next(&mut ledger, false);
    let last_idx = ledger.last_idx();
    let seam = ENTRIES_PER_CHUNK;

    // Invalid ranges
    assert!(ledger.read_framed_entries(0, seam).is_none());
    assert!(ledger.read_framed_entries(1, last_idx + 1).is_none());
    assert!(ledger.read_framed_entries(last_idx, last_idx + 1).is_none());

    // Valid ranges, including ones straddling a seam
    assert_framed_range(&ledger, 1, 1);
    assert_framed_range(&ledger, seam - 1, seam);
    assert_framed_range(&ledger, 1, seam);
    assert_framed_range(&ledger, 1, seam + 1);
    assert_framed_range(&ledger, seam, seam + 1);
    assert_framed_range(&ledger, seam + 1, last_idx);
    assert_framed_range(&ledger, 1, last_idx);
}

#[test]
fn chunk_transition_happens_at_expected_index() {
    let dir = TestDir::new();
    let mut ledger = open_ledger(dir.path());

    // Entry 3 crosses the threshold (8 + 3 * 8 >= 30); entry 4 is the first
    // entry of the second file
    let mut files_seen = vec![];
    for _ in 0..ENTRIES_PER_CHUNK + 1 {
        write_next(&mut ledger, true);
        files_seen.push(file_count(dir.path()));
    }
    assert_eq!(files_seen, vec![1, 1, 1, 2]);
}
