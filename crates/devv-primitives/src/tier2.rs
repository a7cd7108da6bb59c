//! Tier-2 (shard) transactions.
//!
//! A T2 transaction moves coins between addresses inside one shard. Its
//! canonical layout is
//!
//! ```text
//! xfer_size(u64) || nonce_size(u64) || operation(u8) || transfers || nonce || signature
//! ```
//!
//! and the signature covers the SHA-256 digest of everything before it.
//! Exchange transactions carry a wallet signature from the debited address;
//! Create/Modify/Delete carry a node signature and must be INN-signed.

use crate::address::Address;
use crate::buffers::{push_u64, InputBuffer};
use crate::errors::{ProtocolError, ProtocolResult};
use crate::signature::Signature;
use crate::transfer::Transfer;
use crate::KeySource;
use devv_crypto::{sha256, Hash, KeyPair};

/// Minimum nonce length in bytes.
pub const MIN_NONCE_SIZE: usize = 8;

/// Fixed prefix size: transfer size, nonce size, operation byte.
pub const TX_ENVELOPE_SIZE: usize = 17;

/// The operation a transaction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    Create = 0,
    Modify = 1,
    Exchange = 2,
    Delete = 3,
}

impl Operation {
    /// Whether this operation is reserved to the Issuing Node Network.
    pub fn requires_inn(self) -> bool {
        !matches!(self, Operation::Exchange)
    }
}

impl TryFrom<u8> for Operation {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Create),
            1 => Ok(Operation::Modify),
            2 => Ok(Operation::Exchange),
            3 => Ok(Operation::Delete),
            other => Err(ProtocolError::InvalidOperation { value: other }),
        }
    }
}

/// A Tier-2 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier2Transaction {
    operation: Operation,
    transfers: Vec<Transfer>,
    nonce: Vec<u8>,
    signature: Signature,
}

impl Tier2Transaction {
    /// Build and sign a transaction with the given key.
    pub fn new(
        operation: Operation,
        transfers: Vec<Transfer>,
        nonce: Vec<u8>,
        key: &KeyPair,
    ) -> ProtocolResult<Self> {
        if nonce.len() < MIN_NONCE_SIZE {
            return Err(ProtocolError::NonceTooSmall { size: nonce.len() });
        }
        let mut tx = Self {
            operation,
            transfers,
            nonce,
            signature: Signature::null(),
        };
        let digest = tx.message_digest();
        let raw_sig = key
            .sign_digest(&digest)
            .map_err(|_| ProtocolError::BadSignature)?;
        tx.signature = Signature::from_raw(&raw_sig)?;
        Ok(tx)
    }

    /// Build a transaction around an existing signature.
    pub fn with_signature(
        operation: Operation,
        transfers: Vec<Transfer>,
        nonce: Vec<u8>,
        signature: Signature,
    ) -> ProtocolResult<Self> {
        if nonce.len() < MIN_NONCE_SIZE {
            return Err(ProtocolError::NonceTooSmall { size: nonce.len() });
        }
        Ok(Self {
            operation,
            transfers,
            nonce,
            signature,
        })
    }

    /// A convenience for u64 nonces.
    pub fn nonce_bytes(nonce: u64) -> Vec<u8> {
        nonce.to_le_bytes().to_vec()
    }

    /// The operation performed.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The transfers moved by this transaction.
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// The replay nonce.
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// The transaction signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Total serialized size of the transfer section.
    pub fn transfer_size(&self) -> usize {
        self.transfers.iter().map(Transfer::byte_size).sum()
    }

    /// Total serialized size in bytes.
    pub fn byte_size(&self) -> usize {
        TX_ENVELOPE_SIZE + self.transfer_size() + self.nonce.len() + self.signature.size()
    }

    fn pre_signature_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_size());
        push_u64(&mut out, self.transfer_size() as u64);
        push_u64(&mut out, self.nonce.len() as u64);
        out.push(self.operation as u8);
        for transfer in &self.transfers {
            transfer.encode_into(&mut out);
        }
        out.extend_from_slice(&self.nonce);
        out
    }

    /// SHA-256 digest the signature covers.
    pub fn message_digest(&self) -> Hash {
        sha256(&self.pre_signature_bytes())
    }

    /// The canonical encoding.
    pub fn canonical(&self) -> Vec<u8> {
        let mut out = self.pre_signature_bytes();
        out.extend_from_slice(self.signature.canonical());
        out
    }

    /// Read a canonical transaction from a buffer (structure only).
    pub fn from_buffer(buffer: &mut InputBuffer<'_>) -> ProtocolResult<Self> {
        let xfer_size = buffer.next_u64()? as usize;
        let nonce_size = buffer.next_u64()? as usize;
        if nonce_size < MIN_NONCE_SIZE {
            return Err(ProtocolError::NonceTooSmall { size: nonce_size });
        }
        let operation = Operation::try_from(buffer.next_u8()?)?;

        let mut transfers = Vec::new();
        let transfers_start = buffer.offset();
        while buffer.offset() - transfers_start < xfer_size {
            transfers.push(Transfer::from_buffer(buffer)?);
        }
        if buffer.offset() - transfers_start != xfer_size {
            return Err(ProtocolError::MalformedTx(format!(
                "transfer section misaligned at {} of {} bytes",
                buffer.offset() - transfers_start,
                xfer_size
            )));
        }

        let nonce = buffer.next_bytes(nonce_size)?.to_vec();
        let signature = Signature::from_buffer(buffer)?;

        // The signature width is pinned by the operation.
        let wallet_signed = signature.is_wallet_sig();
        let wants_wallet = operation == Operation::Exchange;
        if wallet_signed != wants_wallet {
            return Err(ProtocolError::MalformedTx(format!(
                "operation {:?} with mismatched signature width",
                operation
            )));
        }

        Ok(Self {
            operation,
            transfers,
            nonce,
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

    /// The single address debited by this transaction.
    ///
    /// Multiple debit transfers are allowed only from the same address.
    pub fn debit_address(&self) -> ProtocolResult<&Address> {
        let mut sender: Option<&Address> = None;
        for transfer in &self.transfers {
            if transfer.amount() < 0 {
                match sender {
                    Some(addr) if addr != transfer.address() => {
                        return Err(ProtocolError::MultipleSenders);
                    }
                    _ => sender = Some(transfer.address()),
                }
            }
        }
        sender.ok_or(ProtocolError::MissingDebit)
    }

    /// Stateless soundness check.
    ///
    /// Transfers must sum to zero with exactly one debit address, the
    /// operation/INN privilege rule must hold, and the signature must
    /// verify against the debit address's key. An unknown signer is
    /// reported as a bad signature.
    pub fn is_sound(&self, keys: &impl KeySource) -> ProtocolResult<()> {
        let total: i128 = self.transfers.iter().map(|t| i128::from(t.amount())).sum();
        if total != 0 {
            return Err(ProtocolError::TxAsymmetric { sum: total });
        }

        let sender = self.debit_address()?;
        if self.operation.requires_inn() && !keys.is_inn(sender) {
            return Err(ProtocolError::NotInnSigner);
        }

        let public_key = keys.public_key(sender).ok_or(ProtocolError::BadSignature)?;
        public_key
            .verify_digest(&self.message_digest(), self.signature.raw())
            .map_err(|_| ProtocolError::BadSignature)
    }

    /// JSON debug representation.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "xfer_size": self.transfer_size(),
            "nonce_size": self.nonce.len(),
            "oper": self.operation as u8,
            "xfer": self
                .transfers
                .iter()
                .map(|t| serde_json::json!({
                    "addr": t.address().to_hex(),
                    "coin": t.coin(),
                    "amount": t.amount(),
                    "delay": t.delay(),
                }))
                .collect::<Vec<_>>(),
            "nonce": hex::encode(&self.nonce),
            "sig": self.signature.to_hex(),
        })
    }
}
