//! WAL Reader
//!
//! Handles reading frames from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{KvError, Result};
use super::entry::{decode_body, parse_header};
use super::{WalEntry, HEADER_SIZE};

/// What the reader found at its current position
#[derive(Debug)]
pub(crate) enum Frame {
    /// A complete, valid frame
    Entry(WalEntry),
    /// Clean end of file
    End,
    /// The file ends partway through a frame
    Torn,
    /// The frame is complete but fails validation
    Corrupt(String),
}

/// Reads frames from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Byte offset just past the last valid frame
    position: u64,

    /// Total file length
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// `Ok(None)` at a clean end of file; torn or corrupt frames are errors.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End => Ok(None),
            Frame::Torn => Err(KvError::WalCorruption(format!(
                "Partial frame at offset {}",
                self.position
            ))),
            Frame::Corrupt(reason) => Err(KvError::WalCorruption(reason)),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Offset just past the last valid frame read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        let read = self.read_full(&mut header)?;
        if read == 0 {
            return Ok(Frame::End);
        }
        if read < HEADER_SIZE {
            return Ok(Frame::Torn);
        }

        let (lsn, crc, len) = parse_header(&header);

        // Never allocate past what the file can hold
        let remaining = self.file_len.saturating_sub(self.position + HEADER_SIZE as u64);
        if u64::from(len) > remaining {
            return Ok(Frame::Torn);
        }

        let mut body = vec![0u8; len as usize];
        if self.read_full(&mut body)? < body.len() {
            return Ok(Frame::Torn);
        }

        match decode_body(lsn, crc, &body) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + body.len()) as u64;
                Ok(Frame::Entry(entry))
            }
            Err(e) => Ok(Frame::Corrupt(e.to_string())),
        }
    }

    /// Fill `buf` as far as the file allows, returning the bytes read
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Iterator over WAL entries
///
/// Stops after yielding the first error.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
