//! Engine Module
//!
//! The transactional storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Run read transactions against a consistent view of the buckets
//! - Serialize write transactions and make them durable before applying them
//! - Checkpoint the memtable when the WAL grows too large
//! - Manage crash recovery on startup

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLockReadGuard};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::memtable::{Buckets, MemTable, Records};
use crate::storage::{Checkpoint, CheckpointStats};
use crate::wal::{Operation, WalRecovery, WalWriter};

/// Longest accepted key, in bytes
pub const MAX_KEY_SIZE: usize = 32768;

/// Largest accepted value, in bytes
pub const MAX_VALUE_SIZE: usize = (1 << 31) - 2;

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Write transactions**: serialized by the `wal` mutex, held from the
///   start of the transaction until its commit is applied
///   - commit order: WAL append + fsync → memtable apply
///   - a transaction that fails before or during the WAL append leaves no
///     trace on disk or in memory
///
/// - **Read transactions**: hold the memtable read guard, so every read in
///   the transaction sees the same committed state and never part of a
///   commit
///
/// Calling `update` from inside a `view` closure on the same thread
/// deadlocks.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Write-ahead log; its lock is the writer lock
    wal: Mutex<WalWriter>,

    /// Committed state of every bucket
    memtable: MemTable,

    /// Latest checkpoint file
    checkpoint: Checkpoint,

    /// Set once by `close`
    closed: AtomicBool,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const CHECKPOINT_FILENAME: &'static str = "data.db";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load the checkpoint if one exists
    /// 3. Replay WAL transactions newer than the checkpoint
    /// 4. Ready to serve transactions
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let checkpoint = Checkpoint::new(config.data_dir.join(Self::CHECKPOINT_FILENAME));

        let (buckets, mut last_lsn) = match checkpoint.load()? {
            Some((buckets, stats)) => {
                tracing::info!(
                    "Loaded checkpoint: {} buckets, {} records, last_lsn={}",
                    stats.bucket_count,
                    stats.entry_count,
                    stats.last_lsn
                );
                (buckets, stats.last_lsn)
            }
            None => (Buckets::new(), 0),
        };
        let memtable = MemTable::from_buckets(buckets);

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} transactions recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }

            let mut replayed = 0u64;
            for entry in entries {
                // Already folded into the checkpoint
                if entry.lsn <= last_lsn {
                    continue;
                }
                memtable.apply(&entry.operations);
                last_lsn = entry.lsn;
                replayed += 1;
            }
            if replayed > 0 {
                tracing::debug!("Replayed {} transactions from WAL", replayed);
            }
        }

        let wal = WalWriter::open(&wal_path, last_lsn + 1)?;

        Ok(Self {
            config,
            wal: Mutex::new(wal),
            memtable,
            checkpoint,
            closed: AtomicBool::new(false),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Run a read transaction
    ///
    /// The closure sees one consistent committed state.
    pub fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ReadTxn<'_>) -> Result<T>,
    {
        self.ensure_open()?;
        let txn = ReadTxn {
            buckets: self.memtable.read(),
        };
        f(&txn)
    }

    /// Run a write transaction
    ///
    /// If the closure returns `Ok`, its operations are committed atomically
    /// and durably before `update` returns. If it returns `Err`, or the
    /// commit fails, nothing is persisted.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<T>,
    {
        let mut wal = self.wal.lock();
        self.ensure_open()?;

        let mut txn = WriteTxn {
            committed: &self.memtable,
            created: HashSet::new(),
            staged: HashMap::new(),
            operations: Vec::new(),
        };

        let output = f(&mut txn)?;

        if txn.operations.is_empty() {
            return Ok(output);
        }

        // Step 1: durable
        wal.append(&txn.operations)?;

        // Step 2: visible
        self.memtable.apply(&txn.operations);

        // Step 3: bound the WAL; the commit already stands if this fails
        if wal.size() >= self.config.checkpoint_threshold {
            if let Err(e) = self.checkpoint_locked(&mut wal) {
                tracing::warn!("Checkpoint failed, WAL kept: {}", e);
            }
        }

        Ok(output)
    }

    /// Create a bucket unless it already exists
    pub fn create_bucket_if_not_exists(&self, name: &str) -> Result<()> {
        self.update(|txn| txn.create_bucket_if_not_exists(name))
    }

    /// Write a checkpoint now and truncate the WAL
    pub fn checkpoint(&self) -> Result<CheckpointStats> {
        let mut wal = self.wal.lock();
        self.ensure_open()?;
        self.checkpoint_locked(&mut wal)
    }

    /// Close the engine gracefully
    ///
    /// Waits for a running write transaction, checkpoints, and rejects every
    /// later transaction with `KvError::Closed`. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut wal = self.wal.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if wal.size() > 0 {
            self.checkpoint_locked(&mut wal)?;
        }
        wal.sync()?;

        tracing::info!("Engine closed");
        Ok(())
    }

    /// Internal checkpoint (called with the WAL lock held)
    fn checkpoint_locked(&self, wal: &mut WalWriter) -> Result<CheckpointStats> {
        let last_lsn = wal.current_lsn() - 1;

        let stats = {
            let buckets = self.memtable.read();
            self.checkpoint.write(&buckets, last_lsn)?
        };

        // Everything up to last_lsn is in the checkpoint now
        wal.truncate()?;

        tracing::debug!(
            "Checkpoint written: {} records, {} bytes, last_lsn={}",
            stats.entry_count,
            stats.file_size,
            stats.last_lsn
        );
        Ok(stats)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KvError::Closed);
        }
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the checkpoint file path
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint.path().to_path_buf()
    }

    /// Get the current WAL size in bytes
    pub fn wal_size(&self) -> u64 {
        self.wal.lock().size()
    }

    /// Get the record count across all buckets
    pub fn entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of buckets
    pub fn bucket_count(&self) -> usize {
        self.memtable.bucket_count()
    }

    /// Check whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Reject keys the engine cannot store
pub fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(KvError::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(KvError::InvalidKey(format!(
            "key is {} bytes (max {})",
            key.len(),
            MAX_KEY_SIZE
        )));
    }
    Ok(())
}

fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(KvError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

// =============================================================================
// Transactions
// =============================================================================

/// A read-only view of the committed buckets
pub struct ReadTxn<'a> {
    buckets: RwLockReadGuard<'a, Buckets>,
}

impl ReadTxn<'_> {
    /// Look up a bucket by name
    pub fn bucket(&self, name: &str) -> Option<BucketRef<'_>> {
        self.buckets.get(name).map(|records| BucketRef { records })
    }
}

/// One bucket inside a read transaction
pub struct BucketRef<'a> {
    records: &'a Records,
}

impl<'a> BucketRef<'a> {
    /// Get the value stored at `key`
    pub fn get(&self, key: &[u8]) -> Option<&'a [u8]> {
        self.records.get(key).map(Vec::as_slice)
    }

    /// Number of records in the bucket
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A write transaction in progress
///
/// Changes are staged here and only reach the WAL and memtable when the
/// `update` closure returns `Ok`.
pub struct WriteTxn<'a> {
    /// Committed state (stable: no other writer can run)
    committed: &'a MemTable,

    /// Buckets created by this transaction
    created: HashSet<String>,

    /// Records written by this transaction, by bucket
    staged: HashMap<String, Records>,

    /// Operations to log on commit, in issue order
    operations: Vec<Operation>,
}

impl WriteTxn<'_> {
    /// Whether the bucket exists, counting this transaction's changes
    pub fn bucket_exists(&self, name: &str) -> bool {
        self.created.contains(name) || self.committed.read().contains_key(name)
    }

    /// Create a bucket; an existing bucket is left untouched
    pub fn create_bucket_if_not_exists(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(KvError::InvalidKey("bucket name is empty".to_string()));
        }
        if self.bucket_exists(name) {
            return Ok(());
        }

        self.created.insert(name.to_string());
        self.operations.push(Operation::CreateBucket {
            bucket: name.to_string(),
        });
        Ok(())
    }

    /// Insert or overwrite a record
    pub fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        if !self.bucket_exists(bucket) {
            return Err(KvError::BucketNotFound(bucket.to_string()));
        }
        validate_key(key)?;
        validate_value(value)?;

        self.staged
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        self.operations.push(Operation::Put {
            bucket: bucket.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Get a record, seeing this transaction's own writes
    pub fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if !self.bucket_exists(bucket) {
            return Err(KvError::BucketNotFound(bucket.to_string()));
        }
        if let Some(value) = self.staged.get(bucket).and_then(|r| r.get(key)) {
            return Ok(Some(value.clone()));
        }
        Ok(self
            .committed
            .read()
            .get(bucket)
            .and_then(|records| records.get(key))
            .cloned())
    }
}
