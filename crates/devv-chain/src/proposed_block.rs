//! Proposed blocks.
//!
//! A proposal bundles the transactions a leader wants finalized at the
//! next height, the summary of their net effect, and the validation
//! signatures collected so far. Canonical layout:
//!
//! ```text
//! version(u8) || num_bytes(u64) || prev_hash(32) || tx_size(u64) ||
//! sum_size(u64) || val_count(u32) || txs || summary || validations
//! ```

use devv_crypto::{KeyPair, Hash};
use devv_primitives::buffers::{push_u32, push_u64};
use devv_primitives::{
    Address, AppMode, InputBuffer, KeySource, Signature, Summary, Transaction, Validation,
};

use crate::chain_state::ChainState;
use crate::errors::{ChainError, ChainResult};

/// Current block format version.
pub const BLOCK_VERSION: u8 = 0;

/// Smallest possible serialized proposal (all sections empty).
pub const PROPOSED_BLOCK_MIN_SIZE: usize = 61;

/// A block awaiting the validation threshold.
#[derive(Debug, Clone)]
pub struct ProposedBlock {
    version: u8,
    prev_hash: Hash,
    transactions: Vec<Transaction>,
    summary: Summary,
    validations: Validation,
    /// Working chain state this block was built against or anchored to.
    block_state: ChainState,
}

impl ProposedBlock {
    /// Assemble a fresh proposal.
    pub fn build(
        prev_hash: Hash,
        transactions: Vec<Transaction>,
        summary: Summary,
        block_state: ChainState,
    ) -> Self {
        Self {
            version: BLOCK_VERSION,
            prev_hash,
            transactions,
            summary,
            validations: Validation::new(),
            block_state,
        }
    }

    /// Parse a peer's proposal, soundness-checking every transaction.
    pub fn from_bytes(
        bytes: &[u8],
        prior: &ChainState,
        keys: &impl KeySource,
        mode: AppMode,
    ) -> ChainResult<Self> {
        let mut buffer = InputBuffer::new(bytes);

        let version = buffer.next_u8()?;
        if version != BLOCK_VERSION {
            return Err(ChainError::BadBlockVersion { version });
        }
        let num_bytes = buffer.next_u64()?;
        if num_bytes != bytes.len() as u64 {
            return Err(ChainError::WrongBlockSize {
                expected: num_bytes,
                actual: bytes.len() as u64,
            });
        }
        let prev_hash = buffer.next_hash()?;
        let tx_size = buffer.next_u64()? as usize;
        let sum_size = buffer.next_u64()? as usize;
        let val_count = buffer.next_u32()? as usize;

        let mut transactions = Vec::new();
        let tx_start = buffer.offset();
        while buffer.offset() - tx_start < tx_size {
            let tx = Transaction::from_buffer(&mut buffer, mode)?;
            tx.is_sound(keys)?;
            transactions.push(tx);
        }
        if buffer.offset() - tx_start != tx_size {
            return Err(ChainError::MalformedBlock(format!(
                "transaction section misaligned at {} of {} bytes",
                buffer.offset() - tx_start,
                tx_size
            )));
        }

        let sum_start = buffer.offset();
        let summary = Summary::from_buffer(&mut buffer)?;
        if buffer.offset() - sum_start != sum_size {
            return Err(ChainError::MalformedBlock(format!(
                "summary section misaligned at {} of {} bytes",
                buffer.offset() - sum_start,
                sum_size
            )));
        }

        let validations = Validation::from_buffer(&mut buffer)?;
        if validations.len() != val_count {
            return Err(ChainError::MalformedBlock(format!(
                "validation count mismatch: header {val_count}, section {}",
                validations.len()
            )));
        }

        Ok(Self {
            version,
            prev_hash,
            transactions,
            summary,
            validations,
            block_state: prior.clone(),
        })
    }

    /// Check the whole proposal: every transaction sound, the summary
    /// sane, and every attached validation signature verifying against the
    /// summary digest.
    pub fn validate(&self, keys: &impl KeySource) -> ChainResult<()> {
        for tx in &self.transactions {
            tx.is_sound(keys)?;
        }
        self.summary.check_sane()?;

        let digest = self.summary.digest();
        for (addr, sig) in self.validations.iter() {
            let public_key = keys
                .public_key(addr)
                .ok_or(devv_primitives::ProtocolError::BadSignature)?;
            public_key
                .verify_digest(&digest, sig.raw())
                .map_err(|_| devv_primitives::ProtocolError::BadSignature)?;
        }
        Ok(())
    }

    /// Co-sign the summary with a node key.
    pub fn sign(&mut self, node_addr: Address, key: &KeyPair) -> ChainResult<()> {
        let raw = key
            .sign_digest(&self.summary.digest())
            .map_err(|_| devv_primitives::ProtocolError::BadSignature)?;
        self.validations.add(node_addr, Signature::from_raw(&raw)?);
        Ok(())
    }

    /// Record a peer's validation signature. Returns `false` when the node
    /// had already signed.
    pub fn add_validation(&mut self, node_addr: Address, sig: Signature) -> bool {
        self.validations.add(node_addr, sig)
    }

    /// The VALID message payload for one signer:
    /// `prev_hash || node_address || node_signature`.
    pub fn validation_payload(&self, node_addr: &Address) -> Option<Vec<u8>> {
        let sig = self.validations.get(node_addr)?;
        let mut out = Vec::with_capacity(32 + node_addr.size() + sig.size());
        out.extend_from_slice(&self.prev_hash);
        out.extend_from_slice(node_addr.canonical());
        out.extend_from_slice(sig.canonical());
        Some(out)
    }

    /// Serialized size of the transaction section.
    pub fn tx_size(&self) -> usize {
        self.transactions.iter().map(Transaction::byte_size).sum()
    }

    /// Total serialized size.
    pub fn byte_size(&self) -> usize {
        PROPOSED_BLOCK_MIN_SIZE
            + self.tx_size()
            + self.summary.byte_size()
            + self.validations.byte_size()
    }

    /// The canonical encoding.
    pub fn canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_size());
        out.push(self.version);
        push_u64(&mut out, self.byte_size() as u64);
        out.extend_from_slice(&self.prev_hash);
        push_u64(&mut out, self.tx_size() as u64);
        push_u64(&mut out, self.summary.byte_size() as u64);
        // Mirrors the leading count of the validation section.
        push_u32(&mut out, self.validations.len() as u32);
        for tx in &self.transactions {
            out.extend_from_slice(&tx.canonical());
        }
        out.extend_from_slice(&self.summary.canonical());
        out.extend_from_slice(&self.validations.canonical());
        out
    }

    /// Hash of the previous block this proposal chains onto.
    pub fn prev_hash(&self) -> &Hash {
        &self.prev_hash
    }

    /// Re-anchor the proposal onto a new chain tip.
    pub fn set_prev_hash(&mut self, prev_hash: Hash) {
        self.prev_hash = prev_hash;
    }

    /// The proposed transactions.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Number of proposed transactions.
    pub fn num_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// The block summary.
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// The validation signatures collected so far.
    pub fn validations(&self) -> &Validation {
        &self.validations
    }

    /// The working chain state behind this proposal.
    pub fn block_state(&self) -> &ChainState {
        &self.block_state
    }

    /// Tear the proposal apart for re-anchoring or sealing.
    pub fn into_parts(self) -> (Hash, Vec<Transaction>, Summary, Validation, ChainState) {
        (
            self.prev_hash,
            self.transactions,
            self.summary,
            self.validations,
            self.block_state,
        )
    }
}
