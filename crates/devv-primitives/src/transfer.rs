//! Single-coin transfers.

use crate::address::Address;
use crate::buffers::{push_i64, push_u64, InputBuffer};
use crate::errors::ProtocolResult;

/// Serialized size of a transfer beyond its address bytes.
pub const TRANSFER_NONADDR_SIZE: usize = 24;

/// Movement of `amount` units of one coin at one address.
///
/// A negative amount debits the address, a positive amount credits it. A
/// non-zero delay defers the credit by that many seconds after the block
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    address: Address,
    coin: u64,
    amount: i64,
    delay: u64,
}

impl Transfer {
    /// Create a transfer.
    pub fn new(address: Address, coin: u64, amount: i64, delay: u64) -> Self {
        Self {
            address,
            coin,
            amount,
            delay,
        }
    }

    /// The address the transfer applies to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The coin identifier.
    pub fn coin(&self) -> u64 {
        self.coin
    }

    /// Signed amount; negative debits, positive credits.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Credit delay in seconds.
    pub fn delay(&self) -> u64 {
        self.delay
    }

    /// Serialized size in bytes.
    pub fn byte_size(&self) -> usize {
        self.address.size() + TRANSFER_NONADDR_SIZE
    }

    /// Append the canonical encoding to a buffer.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.address.canonical());
        push_u64(out, self.coin);
        push_i64(out, self.amount);
        push_u64(out, self.delay);
    }

    /// The canonical encoding.
    pub fn canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_size());
        self.encode_into(&mut out);
        out
    }

    /// Read a canonical transfer from a buffer.
    pub fn from_buffer(buffer: &mut InputBuffer<'_>) -> ProtocolResult<Self> {
        let address = Address::from_buffer(buffer)?;
        let coin = buffer.next_u64()?;
        let amount = buffer.next_i64()?;
        let delay = buffer.next_u64()?;
        Ok(Self {
            address,
            coin,
            amount,
            delay,
        })
    }
}
