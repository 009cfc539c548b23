//! WAL Entry definitions
//!
//! Defines the structure of individual WAL frames and their byte encoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Frame header size: LSN (8) + CRC (4) + body length (4)
pub const HEADER_SIZE: usize = 16;

/// A single committed transaction in the WAL
#[derive(Debug, Clone, PartialEq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Timestamp (unix millis) when the transaction committed
    pub timestamp: u64,

    /// The operations of the transaction, in the order they were issued
    pub operations: Vec<Operation>,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a bucket (no-op if it already exists)
    CreateBucket { bucket: String },

    /// Insert or overwrite a record
    Put {
        bucket: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
}

#[derive(Serialize)]
struct BodyRef<'a> {
    timestamp: u64,
    operations: &'a [Operation],
}

#[derive(Deserialize)]
struct Body {
    timestamp: u64,
    operations: Vec<Operation>,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        Self {
            lsn,
            timestamp: now_millis(),
            operations,
        }
    }

    /// Encode to a complete frame (header + body)
    pub fn serialize(&self) -> Result<Vec<u8>> {
        encode_frame(self.lsn, self.timestamp, &self.operations)
    }

    /// Decode one frame from the start of `bytes`
    ///
    /// Returns the entry and the number of bytes consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < HEADER_SIZE {
            return Err(KvError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let (lsn, crc, len) = parse_header(&bytes[..HEADER_SIZE]);
        let total = HEADER_SIZE + len as usize;
        if bytes.len() < total {
            return Err(KvError::WalCorruption(format!(
                "Incomplete body: expected {} bytes, got {}",
                len,
                bytes.len() - HEADER_SIZE
            )));
        }

        let entry = decode_body(lsn, crc, &bytes[HEADER_SIZE..total])?;
        Ok((entry, total))
    }
}

/// Build a frame without cloning the operations
pub(crate) fn encode_frame(lsn: u64, timestamp: u64, operations: &[Operation]) -> Result<Vec<u8>> {
    let body = bincode::serialize(&BodyRef {
        timestamp,
        operations,
    })?;

    let len = u32::try_from(body.len()).map_err(|_| KvError::ValueTooLarge {
        size: body.len(),
        max: u32::MAX as usize,
    })?;

    let lsn_bytes = lsn.to_le_bytes();
    let crc = compute_crc(&lsn_bytes, &body);

    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.extend_from_slice(&lsn_bytes);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Split a header into (lsn, crc, body length)
pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
    let mut lsn = [0u8; 8];
    lsn.copy_from_slice(&header[0..8]);
    let mut crc = [0u8; 4];
    crc.copy_from_slice(&header[8..12]);
    let mut len = [0u8; 4];
    len.copy_from_slice(&header[12..16]);
    (
        u64::from_le_bytes(lsn),
        u32::from_le_bytes(crc),
        u32::from_le_bytes(len),
    )
}

/// Verify the checksum and decode a frame body
pub(crate) fn decode_body(lsn: u64, expected_crc: u32, body: &[u8]) -> Result<WalEntry> {
    let actual = compute_crc(&lsn.to_le_bytes(), body);
    if actual != expected_crc {
        return Err(KvError::WalCorruption(format!(
            "CRC mismatch at lsn {}: expected {:08x}, got {:08x}",
            lsn, expected_crc, actual
        )));
    }

    let decoded: Body = bincode::deserialize(body)
        .map_err(|e| KvError::WalCorruption(format!("Undecodable body at lsn {}: {}", lsn, e)))?;

    Ok(WalEntry {
        lsn,
        timestamp: decoded.timestamp,
        operations: decoded.operations,
    })
}

fn compute_crc(lsn_bytes: &[u8], body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(lsn_bytes);
    hasher.update(body);
    hasher.finalize()
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
