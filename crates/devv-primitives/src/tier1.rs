//! Tier-1 (root chain) transactions.
//!
//! A T1 transaction is a validator node's signed restatement of one T2
//! block summary, laid out as
//!
//! ```text
//! summary_size(u64) || summary || node_address || node_signature
//! ```
//!
//! The node signature covers the SHA-256 digest of the summary's canonical
//! bytes, which is exactly the digest the node co-signed during Tier-2
//! consensus; a T1 transaction is therefore constructible from any final
//! block without re-signing.

use crate::address::Address;
use crate::buffers::{push_u64, InputBuffer};
use crate::errors::{ProtocolError, ProtocolResult};
use crate::signature::Signature;
use crate::summary::Summary;
use crate::KeySource;
use devv_crypto::KeyPair;

/// A Tier-1 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier1Transaction {
    summary: Summary,
    node_address: Address,
    signature: Signature,
}

impl Tier1Transaction {
    /// Wrap an existing summary signature (typically the first validation
    /// of a final block) into a T1 transaction.
    pub fn new(
        summary: Summary,
        node_address: Address,
        signature: Signature,
    ) -> ProtocolResult<Self> {
        summary.check_sane()?;
        if !signature.is_node_sig() {
            return Err(ProtocolError::InvalidSignature {
                length: signature.raw().len(),
            });
        }
        Ok(Self {
            summary,
            node_address,
            signature,
        })
    }

    /// Build and sign a T1 transaction with a node key.
    pub fn create(
        summary: Summary,
        node_address: Address,
        key: &KeyPair,
    ) -> ProtocolResult<Self> {
        summary.check_sane()?;
        let raw_sig = key
            .sign_digest(&summary.digest())
            .map_err(|_| ProtocolError::BadSignature)?;
        Ok(Self {
            summary,
            node_address,
            signature: Signature::from_raw(&raw_sig)?,
        })
    }

    /// The restated block summary.
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// The T2 validator that signed the summary.
    pub fn node_address(&self) -> &Address {
        &self.node_address
    }

    /// The node signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Total serialized size in bytes.
    pub fn byte_size(&self) -> usize {
        8 + self.summary.byte_size() + self.node_address.size() + self.signature.size()
    }

    /// The canonical encoding.
    pub fn canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_size());
        push_u64(&mut out, self.summary.byte_size() as u64);
        out.extend_from_slice(&self.summary.canonical());
        out.extend_from_slice(self.node_address.canonical());
        out.extend_from_slice(self.signature.canonical());
        out
    }

    /// Read a canonical transaction from a buffer (structure only).
    pub fn from_buffer(buffer: &mut InputBuffer<'_>) -> ProtocolResult<Self> {
        let summary_size = buffer.next_u64()? as usize;
        let summary_start = buffer.offset();
        let summary = Summary::from_buffer(buffer)?;
        if buffer.offset() - summary_start != summary_size {
            return Err(ProtocolError::MalformedTx(format!(
                "summary section misaligned at {} of {} bytes",
                buffer.offset() - summary_start,
                summary_size
            )));
        }
        let node_address = Address::from_buffer(buffer)?;
        if !node_address.is_node() {
            return Err(ProtocolError::InvalidAddress {
                length: node_address.raw().len(),
            });
        }
        let signature = Signature::from_buffer(buffer)?;
        Ok(Self {
            summary,
            node_address,
            signature,
        })
    }

    /// Read a canonical transaction and check its soundness.
    pub fn from_buffer_sound(
        buffer: &mut InputBuffer<'_>,
        keys: &impl KeySource,
    ) -> ProtocolResult<Self> {
        let tx = Self::from_buffer(buffer)?;
        tx.is_sound(keys)?;
        Ok(tx)
    }

    /// Soundness: the summary is sane and the node signature verifies.
    pub fn is_sound(&self, keys: &impl KeySource) -> ProtocolResult<()> {
        self.summary.check_sane()?;
        let public_key = keys
            .public_key(&self.node_address)
            .ok_or(ProtocolError::BadSignature)?;
        public_key
            .verify_digest(&self.summary.digest(), self.signature.raw())
            .map_err(|_| ProtocolError::BadSignature)
    }
}
