//! MemTable Module
//!
//! In-memory image of every committed record.
//!
//! ## Responsibilities
//! - Serve reads for read transactions
//! - Apply committed write transactions atomically
//! - Track size for diagnostics
//! - Ordered iteration for checkpoint creation
//!
//! ## Data Structure Choice
//! One BTreeMap per bucket, all buckets behind a single RwLock:
//! - A read transaction holds the read guard, so it sees one consistent state
//! - A commit applies all its operations under one write guard

mod table;

use std::collections::{BTreeMap, HashMap};

pub use table::MemTable;

/// Records of one bucket, ordered by key
pub type Records = BTreeMap<Vec<u8>, Vec<u8>>;

/// Every bucket, by name
pub type Buckets = HashMap<String, Records>;
