//! Little-endian serialization helpers and a checked read cursor.

use crate::errors::{ProtocolError, ProtocolResult};
use devv_crypto::{Hash, HASH_SIZE};

/// Append a `u32` in little-endian order.
pub fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Append a `u64` in little-endian order.
pub fn push_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Append an `i64` in little-endian order.
pub fn push_i64(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// A read cursor over serialized bytes.
///
/// Every read is bounds-checked and returns `Truncated` instead of
/// panicking, so corrupt wire input can never abort a worker.
#[derive(Debug)]
pub struct InputBuffer<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> InputBuffer<'a> {
    /// Wrap a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Total length of the underlying slice.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying slice is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current read position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether any bytes remain.
    pub fn has_remaining(&self) -> bool {
        self.offset < self.data.len()
    }

    fn take(&mut self, count: usize) -> ProtocolResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(ProtocolError::Truncated {
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    /// Read one byte.
    pub fn next_u8(&mut self) -> ProtocolResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian `u32`.
    pub fn next_u32(&mut self) -> ProtocolResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    /// Read a little-endian `u64`.
    pub fn next_u64(&mut self) -> ProtocolResult<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }

    /// Read a little-endian `i64`.
    pub fn next_i64(&mut self) -> ProtocolResult<i64> {
        let bytes = self.take(8)?;
        Ok(i64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }

    /// Read a 32-byte hash.
    pub fn next_hash(&mut self) -> ProtocolResult<Hash> {
        let bytes = self.take(HASH_SIZE)?;
        Ok(bytes.try_into().expect("32-byte slice"))
    }

    /// Read `count` raw bytes.
    pub fn next_bytes(&mut self, count: usize) -> ProtocolResult<&'a [u8]> {
        self.take(count)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> ProtocolResult<u8> {
        self.data
            .get(self.offset)
            .copied()
            .ok_or(ProtocolError::Truncated {
                needed: 1,
                available: 0,
            })
    }
}
