//! Checkpoint file
//!
//! Writes the full memtable image and loads it back on startup.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};
use crate::memtable::{Buckets, Records};

use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Summary of a written or loaded checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointStats {
    /// Highest WAL LSN folded into the checkpoint
    pub last_lsn: u64,
    /// Number of buckets
    pub bucket_count: usize,
    /// Number of records across all buckets
    pub entry_count: u64,
    /// File size in bytes
    pub file_size: u64,
}

/// Checkpoint file at a fixed path
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint, or `None` if it was never written
    pub fn load(&self) -> Result<Option<(Buckets, CheckpointStats)>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if data.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(format!("file too short: {} bytes", data.len())));
        }

        let body_len = data.len() - FOOTER_SIZE;
        let mut footer = Cursor::new(&data[body_len..]);
        let expected_crc = footer.u32()?;
        let actual_crc = crc32fast::hash(&data[..body_len]);
        if expected_crc != actual_crc {
            return Err(corrupt(format!(
                "CRC mismatch: expected {:08x}, got {:08x}",
                expected_crc, actual_crc
            )));
        }

        let mut cursor = Cursor::new(&data[..body_len]);
        if cursor.take(4)? != MAGIC {
            return Err(corrupt("invalid magic".to_string()));
        }
        let version = cursor.u16()?;
        if version != VERSION {
            return Err(corrupt(format!("unsupported version: {}", version)));
        }
        let last_lsn = cursor.u64()?;
        let bucket_count = cursor.u32()? as usize;

        let mut buckets = Buckets::with_capacity(bucket_count);
        let mut entry_count = 0u64;
        for _ in 0..bucket_count {
            let name_len = cursor.u32()? as usize;
            let entries = cursor.u64()?;
            let name = String::from_utf8(cursor.take(name_len)?.to_vec())
                .map_err(|_| corrupt("bucket name is not UTF-8".to_string()))?;

            let mut records = Records::new();
            for _ in 0..entries {
                let key_len = cursor.u32()? as usize;
                let val_len = cursor.u32()? as usize;
                let key = cursor.take(key_len)?.to_vec();
                let value = cursor.take(val_len)?.to_vec();
                records.insert(key, value);
            }
            entry_count += entries;
            buckets.insert(name, records);
        }

        if !cursor.is_empty() {
            return Err(corrupt("trailing bytes after last bucket".to_string()));
        }

        let stats = CheckpointStats {
            last_lsn,
            bucket_count,
            entry_count,
            file_size: data.len() as u64,
        };
        Ok(Some((buckets, stats)))
    }

    /// Replace the checkpoint with `buckets`, durably
    ///
    /// The previous checkpoint stays intact until the rename.
    pub fn write(&self, buckets: &Buckets, last_lsn: u64) -> Result<CheckpointStats> {
        let temp_path = self.path.with_extension("db.tmp");

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = HashingWriter::new(BufWriter::new(file));

        // Sorted bucket order keeps the file deterministic
        let mut names: Vec<&String> = buckets.keys().collect();
        names.sort();

        writer.write(MAGIC)?;
        writer.write(&VERSION.to_le_bytes())?;
        writer.write(&last_lsn.to_le_bytes())?;
        writer.write(&(names.len() as u32).to_le_bytes())?;

        let mut entry_count = 0u64;
        for name in names {
            let records = &buckets[name];
            writer.write(&(name.len() as u32).to_le_bytes())?;
            writer.write(&(records.len() as u64).to_le_bytes())?;
            writer.write(name.as_bytes())?;

            for (key, value) in records {
                writer.write(&(key.len() as u32).to_le_bytes())?;
                writer.write(&(value.len() as u32).to_le_bytes())?;
                writer.write(key)?;
                writer.write(value)?;
            }
            entry_count += records.len() as u64;
        }

        let (mut inner, crc) = writer.finish();
        inner.write_all(&crc.to_le_bytes())?;
        inner.write_all(&[0u8; 4])?;
        inner.flush()?;

        let file = inner
            .into_inner()
            .map_err(|e| KvError::Io(e.into_error()))?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        sync_parent_dir(&self.path);

        Ok(CheckpointStats {
            last_lsn,
            bucket_count: buckets.len(),
            entry_count,
            file_size,
        })
    }
}

fn corrupt(reason: String) -> KvError {
    KvError::CheckpointCorruption(reason)
}

/// Persist the rename itself; not every platform can open a directory
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

/// Writer that checksums everything passing through it
struct HashingWriter<W: Write> {
    inner: W,
    hasher: crc32fast::Hasher,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.hasher.update(bytes);
        Ok(())
    }

    fn finish(self) -> (W, u32) {
        (self.inner, self.hasher.finalize())
    }
}

/// Bounds-checked little-endian reader over a byte slice
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| corrupt(format!("truncated at offset {}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(buf))
    }

    fn u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}
