//! MemTable implementation
//!
//! Bucketed BTreeMaps with a RwLock for concurrency.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};

use super::Buckets;
use crate::wal::Operation;

/// In-memory table of committed records
pub struct MemTable {
    /// All buckets (readers share, commits take exclusive access)
    buckets: RwLock<Buckets>,

    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self::from_buckets(Buckets::new())
    }

    /// Create a MemTable from a loaded checkpoint
    pub fn from_buckets(buckets: Buckets) -> Self {
        let size = buckets
            .values()
            .flat_map(|records| records.iter())
            .map(|(k, v)| k.len() + v.len())
            .sum();

        Self {
            buckets: RwLock::new(buckets),
            size: AtomicUsize::new(size),
        }
    }

    /// Shared access for the lifetime of a read transaction
    pub fn read(&self) -> RwLockReadGuard<'_, Buckets> {
        self.buckets.read()
    }

    /// Apply a committed transaction (write lock)
    ///
    /// Readers observe either none or all of `operations`.
    pub fn apply(&self, operations: &[Operation]) {
        let mut buckets = self.buckets.write();

        for operation in operations {
            match operation {
                Operation::CreateBucket { bucket } => {
                    buckets.entry(bucket.clone()).or_default();
                }
                Operation::Put { bucket, key, value } => {
                    let records = buckets.entry(bucket.clone()).or_default();
                    let added = key.len() + value.len();
                    match records.insert(key.clone(), value.clone()) {
                        Some(old) => {
                            let removed = key.len() + old.len();
                            if added >= removed {
                                self.size.fetch_add(added - removed, Ordering::Relaxed);
                            } else {
                                self.size.fetch_sub(removed - added, Ordering::Relaxed);
                            }
                        }
                        None => {
                            self.size.fetch_add(added, Ordering::Relaxed);
                        }
                    }
                }
            }
        }
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Get entry count across all buckets
    pub fn entry_count(&self) -> usize {
        self.buckets.read().values().map(|r| r.len()).sum()
    }

    /// Get the number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Check if no bucket holds a record
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
