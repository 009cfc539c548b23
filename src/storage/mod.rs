//! Storage Module
//!
//! Durable checkpoint of the whole keyspace.
//!
//! ## Responsibilities
//! - Persist the committed state so the WAL can be truncated
//! - Replace the previous checkpoint atomically (write temp, fsync, rename)
//! - Detect corruption on load
//!
//! ## File Format (V1)
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (18 bytes)                                        │
//! │   Magic: "HKVC" (4) | Version: u16 (2) | LastLSN: u64 (8) │
//! │   BucketCount: u32 (4)                                   │
//! ├──────────────────────────────────────────────────────────┤
//! │ Bucket Section (repeated BucketCount times)              │
//! │   [NameLen: u32][EntryCount: u64][Name]                  │
//! │   [KeyLen: u32][ValLen: u32][Key][Value] ... per entry   │
//! ├──────────────────────────────────────────────────────────┤
//! │ Footer (8 bytes)                                         │
//! │   CRC32 of everything above: u32 (4) | Padding (4)       │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod checkpoint;

pub use checkpoint::{Checkpoint, CheckpointStats};

/// Magic bytes identifying an httpkv checkpoint file
pub(crate) const MAGIC: &[u8; 4] = b"HKVC";

/// Current checkpoint format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + LastLSN (8) + BucketCount (4)
pub(crate) const HEADER_SIZE: usize = 18;

/// Footer size: CRC (4) + Padding (4)
pub(crate) const FOOTER_SIZE: usize = 8;
