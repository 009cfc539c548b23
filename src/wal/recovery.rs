//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;
use super::reader::Frame;
use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries found (recovery stops at the first)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (torn or corrupt tail removed)
    pub was_truncated: bool,
}

struct Scan {
    entries: Vec<WalEntry>,
    result: RecoveryResult,
    valid_len: u64,
    damaged: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read frames in order
    /// 2. Stop at the first torn, corrupt or out-of-order frame
    /// 3. Truncate everything from that frame on
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let mut scan = Self::scan(path)?;

        if scan.damaged {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
            scan.result.was_truncated = true;

            tracing::warn!(
                "WAL {} truncated to {} bytes after lsn {}",
                path.display(),
                scan.valid_len,
                scan.result.last_lsn
            );
        }

        Ok((scan.entries, scan.result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Ok(Self::scan(path)?.result)
    }

    fn scan(path: &Path) -> Result<Scan> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();
        let mut damaged = false;
        let mut valid_len = 0u64;

        loop {
            match reader.next_frame()? {
                Frame::Entry(entry) => {
                    if entry.lsn <= result.last_lsn {
                        tracing::warn!(
                            "WAL lsn went backwards ({} after {})",
                            entry.lsn,
                            result.last_lsn
                        );
                        result.entries_corrupted += 1;
                        damaged = true;
                        break;
                    }
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    valid_len = reader.position();
                    entries.push(entry);
                }
                Frame::End => break,
                Frame::Torn => {
                    damaged = true;
                    break;
                }
                Frame::Corrupt(reason) => {
                    tracing::warn!("WAL corruption: {}", reason);
                    result.entries_corrupted += 1;
                    damaged = true;
                    break;
                }
            }
        }

        Ok(Scan {
            entries,
            result,
            valid_len,
            damaged,
        })
    }
}
