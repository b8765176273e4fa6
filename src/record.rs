//! Record type and its binary codec.
//!
//! Each record is encoded as:
//! - Checksum (4 bytes): CRC32 of offset and value
//! - Offset (8 bytes): logical offset assigned by the log
//! - Value (variable): opaque payload

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc32fast::Hasher;

/// Size of the record header (checksum + offset).
pub const HEADER_SIZE: usize = 12;

/// A single entry in the commit log.
///
/// The offset is assigned by the log at append time and written into the
/// encoded bytes, so a reader recovers it from the payload itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Logical offset of the record within the log.
    pub offset: u64,
    /// Opaque payload.
    pub value: Bytes,
}

impl Record {
    /// Create a record with an unassigned offset.
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            offset: 0,
            value: value.into(),
        }
    }

    /// Encode the record into bytes.
    ///
    /// Format: [checksum: u32][offset: u64][value: bytes]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.value.len());
        buf.put_u32_le(Self::checksum(self.offset, &self.value));
        buf.put_u64_le(self.offset);
        buf.put_slice(&self.value);
        buf.to_vec()
    }

    /// Decode a record from bytes.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::codec(format!(
                "record too short: {} bytes",
                data.len()
            )));
        }

        let checksum = data.get_u32_le();
        let offset = data.get_u64_le();
        let value = Bytes::copy_from_slice(data);

        if checksum != Self::checksum(offset, &value) {
            return Err(Error::codec(format!(
                "record checksum mismatch at offset {}",
                offset
            )));
        }

        Ok(Record { offset, value })
    }

    /// Get the total size of the encoded record.
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.value.len()
    }

    fn checksum(offset: u64, value: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(&offset.to_le_bytes());
        hasher.update(value);
        hasher.finalize()
    }
}
