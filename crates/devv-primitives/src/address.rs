//! Tagged public-key addresses.
//!
//! An address is the compressed SEC1 public key of its owner, prefixed with
//! a single type byte equal to the raw key length. Wallets use secp256k1
//! (33 raw bytes), validator nodes secp384r1 (49 raw bytes). The canonical
//! form always carries the prefix and is the basis for equality, ordering,
//! and hashing.

use crate::buffers::InputBuffer;
use crate::errors::{ProtocolError, ProtocolResult};
use devv_crypto::PublicKey;

/// Raw byte length of a wallet address (compressed secp256k1 key).
pub const WALLET_ADDR_SIZE: usize = 33;

/// Raw byte length of a node address (compressed secp384r1 key).
pub const NODE_ADDR_SIZE: usize = 49;

/// Canonical byte length of a wallet address (type byte included).
pub const WALLET_ADDR_BUF_SIZE: usize = WALLET_ADDR_SIZE + 1;

/// Canonical byte length of a node address (type byte included).
pub const NODE_ADDR_BUF_SIZE: usize = NODE_ADDR_SIZE + 1;

/// A wallet or node address in canonical form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    canonical: Vec<u8>,
}

impl Address {
    /// Build an address from bytes, with or without the type prefix.
    pub fn from_raw(bytes: &[u8]) -> ProtocolResult<Self> {
        let canonical = match bytes.len() {
            WALLET_ADDR_SIZE | NODE_ADDR_SIZE => {
                let mut v = Vec::with_capacity(bytes.len() + 1);
                v.push(bytes.len() as u8);
                v.extend_from_slice(bytes);
                v
            }
            WALLET_ADDR_BUF_SIZE if bytes[0] as usize == WALLET_ADDR_SIZE => bytes.to_vec(),
            NODE_ADDR_BUF_SIZE if bytes[0] as usize == NODE_ADDR_SIZE => bytes.to_vec(),
            other => return Err(ProtocolError::InvalidAddress { length: other }),
        };
        Ok(Self { canonical })
    }

    /// Read a canonical address from a buffer.
    pub fn from_buffer(buffer: &mut InputBuffer<'_>) -> ProtocolResult<Self> {
        let tag = buffer.peek_u8()?;
        let raw_len = tag as usize;
        if raw_len != WALLET_ADDR_SIZE && raw_len != NODE_ADDR_SIZE {
            return Err(ProtocolError::InvalidAddress { length: raw_len });
        }
        let bytes = buffer.next_bytes(raw_len + 1)?;
        Ok(Self {
            canonical: bytes.to_vec(),
        })
    }

    /// Parse an address from its hex text form (raw bytes, no type prefix).
    pub fn from_hex(text: &str) -> ProtocolResult<Self> {
        let raw = hex::decode(text.trim()).map_err(|_| ProtocolError::InvalidHex)?;
        Self::from_raw(&raw)
    }

    /// The canonical bytes, type prefix included.
    pub fn canonical(&self) -> &[u8] {
        &self.canonical
    }

    /// The raw public key bytes without the type prefix.
    pub fn raw(&self) -> &[u8] {
        &self.canonical[1..]
    }

    /// Canonical length in bytes.
    pub fn size(&self) -> usize {
        self.canonical.len()
    }

    /// Whether this is a wallet (secp256k1) address.
    pub fn is_wallet(&self) -> bool {
        self.canonical[0] as usize == WALLET_ADDR_SIZE
    }

    /// Whether this is a node (secp384r1) address.
    pub fn is_node(&self) -> bool {
        self.canonical[0] as usize == NODE_ADDR_SIZE
    }

    /// Recover the public key the address encodes.
    pub fn public_key(&self) -> ProtocolResult<PublicKey> {
        PublicKey::from_sec1_bytes(self.raw()).map_err(|_| ProtocolError::InvalidAddress {
            length: self.raw().len(),
        })
    }

    /// Hex text form of the raw bytes (66 chars wallet, 98 chars node).
    pub fn to_hex(&self) -> String {
        hex::encode(self.raw())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_wallet() { "wallet" } else { "node" };
        write!(f, "Address({kind}:{}..)", &self.to_hex()[..8])
    }
}
