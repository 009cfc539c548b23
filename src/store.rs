//! Store Module
//!
//! The storage contract the request handler depends on: one read and one
//! write, each in its own transaction against the single bucket.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::BUCKET_NAME;
use crate::engine::{validate_key, Engine};
use crate::error::{KvError, Result};

/// Transactional key-value persistence
///
/// Implementations must make `write` all-or-nothing and must never let
/// `read` observe part of a concurrent `write`.
pub trait Store: Send + Sync {
    /// Read the value at `key` in an isolated read transaction
    ///
    /// A missing key is `Ok(None)`, not an error.
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite the value at `key` in one write transaction
    ///
    /// On `Ok` the value is durable (for durable implementations).
    fn write(&self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// The engine-backed store, bound to `BUCKET_NAME`
pub struct BucketStore {
    engine: Arc<Engine>,
}

impl BucketStore {
    /// Wrap an engine, creating the bucket if it is missing
    pub fn open(engine: Arc<Engine>) -> Result<Self> {
        engine.create_bucket_if_not_exists(BUCKET_NAME)?;
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}

impl Store for BucketStore {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.engine.view(|txn| {
            let bucket = txn
                .bucket(BUCKET_NAME)
                .ok_or_else(|| KvError::BucketNotFound(BUCKET_NAME.to_string()))?;
            Ok(bucket.get(key).map(<[u8]>::to_vec))
        })
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.engine.update(|txn| txn.put(BUCKET_NAME, key, value))
    }
}

/// A volatile store; contents are lost when the process exits
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.records.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}
