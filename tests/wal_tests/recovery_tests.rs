//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from a clean WAL (no corruption)
//! - Recovery from an empty WAL
//! - Recovery with partial writes (truncated tail)
//! - Recovery with corrupted entries (CRC mismatch)
//! - Verify mode (stats only, file untouched)

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use httpkv::wal::{WalEntry, WalRecovery, WalWriter};

use super::{put, setup_temp_wal};

// =============================================================================
// Helper Functions
// =============================================================================

/// Write entries using WalWriter (produces a well-formed WAL)
fn write_entries_via_writer(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, 1).unwrap();
    for i in 0..count {
        writer
            .append(&[put(&format!("key{}", i), &format!("value{}", i))])
            .unwrap();
    }
}

/// Write raw serialized entries directly to a file (for crafting corruption)
fn write_raw_entries(path: &Path, entries: &[WalEntry]) {
    let mut file = File::create(path).unwrap();
    for entry in entries {
        let bytes = entry.serialize().unwrap();
        file.write_all(&bytes).unwrap();
    }
    file.sync_all().unwrap();
}

fn frame_len(lsn: u64, key: &str) -> u64 {
    WalEntry::new(lsn, vec![put(key, "v")]).serialize().unwrap().len() as u64
}

// =============================================================================
// Recover: Clean WAL Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 0);
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 10);
    let size_before = fs::metadata(&wal_path).unwrap().len();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), size_before);
}

// =============================================================================
// Recover: Partial Write Tests
// =============================================================================

#[test]
fn test_recover_torn_tail_is_truncated() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw_entries(
        &wal_path,
        &[
            WalEntry::new(1, vec![put("a", "v")]),
            WalEntry::new(2, vec![put("b", "v")]),
        ],
    );
    let first_len = frame_len(1, "a");

    // Chop the second frame in half
    let full_len = fs::metadata(&wal_path).unwrap().len();
    let torn_len = first_len + (full_len - first_len) / 2;
    OpenOptions::new()
        .write(true)
        .open(&wal_path)
        .unwrap()
        .set_len(torn_len)
        .unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert_eq!(result.entries_corrupted, 0);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), first_len);
}

#[test]
fn test_recover_partial_header() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[1, 2, 3]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert!(result.was_truncated);
}

// =============================================================================
// Recover: Corruption Tests
// =============================================================================

#[test]
fn test_recover_stops_at_crc_mismatch() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw_entries(
        &wal_path,
        &[
            WalEntry::new(1, vec![put("a", "v")]),
            WalEntry::new(2, vec![put("b", "v")]),
            WalEntry::new(3, vec![put("c", "v")]),
        ],
    );

    // Flip the last byte of the second frame's body
    let mut bytes = fs::read(&wal_path).unwrap();
    let second_end = (frame_len(1, "a") + frame_len(2, "b")) as usize;
    bytes[second_end - 1] ^= 0xFF;
    fs::write(&wal_path, bytes).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_recovered, 1);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), frame_len(1, "a"));
}

#[test]
fn test_recover_rejects_lsn_going_backwards() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw_entries(
        &wal_path,
        &[
            WalEntry::new(5, vec![put("a", "v")]),
            WalEntry::new(3, vec![put("b", "v")]),
        ],
    );

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 5);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), frame_len(5, "a"));
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xFF; 7]).unwrap();
    drop(file);
    let size_before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert!(!result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), size_before);
}
