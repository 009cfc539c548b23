//! WAL Writer
//!
//! Handles appending committed transactions to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};
use super::entry::{encode_frame, now_millis};
use super::Operation;

/// Writes frames to the WAL file
///
/// Every append is fsynced before it returns; a failed append truncates the
/// file back to its previous length so no partial frame is left behind.
/// If that rollback fails too, the writer refuses every later append until
/// a successful `truncate`: a frame written after unknown bytes would be
/// dropped by recovery.
pub struct WalWriter {
    /// Underlying file (append mode)
    file: File,

    /// Path, kept for diagnostics
    path: PathBuf,

    /// LSN the next append will receive
    next_lsn: u64,

    /// Current file length in bytes
    size: u64,

    /// Set when the file may end in a partial frame
    poisoned: bool,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// `next_lsn` must be greater than every LSN already durable (in the log
    /// or in a checkpoint); recovery computes it.
    pub fn open(path: &Path, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            file,
            path: path.to_path_buf(),
            next_lsn: next_lsn.max(1),
            size,
            poisoned: false,
        })
    }

    /// Append one transaction and fsync it
    ///
    /// Returns the LSN assigned to the frame.
    pub fn append(&mut self, operations: &[Operation]) -> Result<u64> {
        if self.poisoned {
            return Err(KvError::WalCorruption(format!(
                "WAL {} has an unrolled partial frame; appends refused",
                self.path.display()
            )));
        }

        let lsn = self.next_lsn;
        let frame = encode_frame(lsn, now_millis(), operations)?;

        let written = self
            .file
            .write_all(&frame)
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            // Roll back whatever part of the frame reached the file
            if let Err(rollback) = self.file.set_len(self.size) {
                self.poisoned = true;
                tracing::error!(
                    "Failed to roll back WAL {} to {} bytes: {}",
                    self.path.display(),
                    self.size,
                    rollback
                );
            }
            return Err(e.into());
        }

        self.size += frame.len() as u64;
        self.next_lsn += 1;
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Discard every frame (after a checkpoint made them redundant)
    ///
    /// LSNs keep counting up from where they were.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        // The file is empty now whether or not the sync below succeeds
        self.size = 0;
        self.poisoned = false;
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Get the current file length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }
}
