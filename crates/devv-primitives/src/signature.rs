//! Tagged ECDSA signatures.
//!
//! Like addresses, signatures carry a single type byte equal to their raw
//! length: 72 bytes for wallet (secp256k1) signatures, 103 for node
//! (secp384r1) signatures. The raw bytes are a DER signature zero-padded
//! to that fixed width. A null signature is a single zero byte.

use crate::buffers::InputBuffer;
use crate::errors::{ProtocolError, ProtocolResult};
use devv_crypto::{NODE_SIG_SIZE, WALLET_SIG_SIZE};

/// Canonical byte length of a wallet signature (type byte included).
pub const WALLET_SIG_BUF_SIZE: usize = WALLET_SIG_SIZE + 1;

/// Canonical byte length of a node signature (type byte included).
pub const NODE_SIG_BUF_SIZE: usize = NODE_SIG_SIZE + 1;

/// A wallet or node signature in canonical form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    canonical: Vec<u8>,
}

impl Signature {
    /// The distinguished null signature (single zero byte).
    pub fn null() -> Self {
        Self { canonical: vec![0] }
    }

    /// Whether this is the null signature.
    pub fn is_null(&self) -> bool {
        self.canonical[0] == 0
    }

    /// Build a signature from bytes, with or without the type prefix.
    pub fn from_raw(bytes: &[u8]) -> ProtocolResult<Self> {
        let canonical = match bytes.len() {
            WALLET_SIG_SIZE | NODE_SIG_SIZE => {
                let mut v = Vec::with_capacity(bytes.len() + 1);
                v.push(bytes.len() as u8);
                v.extend_from_slice(bytes);
                v
            }
            WALLET_SIG_BUF_SIZE if bytes[0] as usize == WALLET_SIG_SIZE => bytes.to_vec(),
            NODE_SIG_BUF_SIZE if bytes[0] as usize == NODE_SIG_SIZE => bytes.to_vec(),
            other => return Err(ProtocolError::InvalidSignature { length: other }),
        };
        Ok(Self { canonical })
    }

    /// Read a canonical signature from a buffer.
    pub fn from_buffer(buffer: &mut InputBuffer<'_>) -> ProtocolResult<Self> {
        let tag = buffer.peek_u8()?;
        let raw_len = tag as usize;
        if raw_len != WALLET_SIG_SIZE && raw_len != NODE_SIG_SIZE {
            return Err(ProtocolError::InvalidSignature { length: raw_len });
        }
        let bytes = buffer.next_bytes(raw_len + 1)?;
        Ok(Self {
            canonical: bytes.to_vec(),
        })
    }

    /// The canonical bytes, type prefix included.
    pub fn canonical(&self) -> &[u8] {
        &self.canonical
    }

    /// The padded DER bytes without the type prefix.
    pub fn raw(&self) -> &[u8] {
        &self.canonical[1..]
    }

    /// Canonical length in bytes.
    pub fn size(&self) -> usize {
        self.canonical.len()
    }

    /// Whether this is a wallet-sized signature.
    pub fn is_wallet_sig(&self) -> bool {
        self.canonical[0] as usize == WALLET_SIG_SIZE
    }

    /// Whether this is a node-sized signature.
    pub fn is_node_sig(&self) -> bool {
        self.canonical[0] as usize == NODE_SIG_SIZE
    }

    /// Hex text form of the canonical bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.canonical)
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            return write!(f, "Signature(null)");
        }
        write!(f, "Signature({}..)", &self.to_hex()[..10])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_signature() {
        let sig = Signature::null();
        assert!(sig.is_null());
        assert_eq!(sig.canonical(), &[0]);
    }

    #[test]
    fn test_prefix_handling() {
        let raw = [3u8; WALLET_SIG_SIZE];
        let sig = Signature::from_raw(&raw).unwrap();
        assert_eq!(sig.size(), WALLET_SIG_BUF_SIZE);
        assert!(sig.is_wallet_sig());
        assert_eq!(Signature::from_raw(sig.canonical()).unwrap(), sig);
    }

    #[test]
    fn test_node_signature_size() {
        let sig = Signature::from_raw(&[1u8; NODE_SIG_SIZE]).unwrap();
        assert!(sig.is_node_sig());
        assert_eq!(sig.raw().len(), NODE_SIG_SIZE);
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert!(Signature::from_raw(&[0u8; 64]).is_err());
        assert!(Signature::from_raw(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_buffer_roundtrip() {
        let sig = Signature::from_raw(&[9u8; NODE_SIG_SIZE]).unwrap();
        let mut buffer_bytes = sig.canonical().to_vec();
        buffer_bytes.extend_from_slice(&[1, 2, 3]);

        let mut buffer = InputBuffer::new(&buffer_bytes);
        assert_eq!(Signature::from_buffer(&mut buffer).unwrap(), sig);
        assert_eq!(buffer.remaining(), 3);
    }
}
