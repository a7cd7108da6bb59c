//! Final blocks.
//!
//! A final block is a proposal that crossed the validation threshold,
//! stamped with the finalization time and the merkle root of its
//! transactions. Canonical layout:
//!
//! ```text
//! version(u8) || block_time_ms(u64) || num_bytes(u64) || prev_hash(32) ||
//! merkle_root(32) || tx_size(u64) || sum_size(u64) || val_count(u32) ||
//! txs || summary || validations
//! ```
//!
//! Final blocks are immutable once appended to the chain.

use devv_crypto::{sha256, Hash};
use devv_primitives::buffers::{push_u32, push_u64};
use devv_primitives::{AppMode, InputBuffer, KeySource, Summary, Transaction, Validation};

use crate::chain_state::ChainState;
use crate::errors::{ChainError, ChainResult};
use crate::proposed_block::{ProposedBlock, BLOCK_VERSION};

/// Smallest possible serialized final block (all sections empty).
pub const FINAL_BLOCK_MIN_SIZE: usize = 101;

/// A finalized, immutable block.
#[derive(Debug, Clone)]
pub struct FinalBlock {
    version: u8,
    block_time_ms: u64,
    prev_hash: Hash,
    merkle_root: Hash,
    transactions: Vec<Transaction>,
    summary: Summary,
    validations: Validation,
    block_state: ChainState,
}

impl FinalBlock {
    /// Promote a proposal that met the validation threshold.
    ///
    /// The merkle root is the SHA-256 of the concatenated transaction
    /// canonicals; it travels with the block as an informational field.
    pub fn seal(proposal: ProposedBlock, block_time_ms: u64) -> Self {
        let (prev_hash, transactions, summary, validations, block_state) = proposal.into_parts();
        let merkle_root = Self::compute_merkle(&transactions);
        Self {
            version: BLOCK_VERSION,
            block_time_ms,
            prev_hash,
            merkle_root,
            transactions,
            summary,
            validations,
            block_state,
        }
    }

    /// SHA-256 over the concatenated canonical transactions.
    pub fn compute_merkle(transactions: &[Transaction]) -> Hash {
        let mut bytes = Vec::new();
        for tx in transactions {
            bytes.extend_from_slice(&tx.canonical());
        }
        sha256(&bytes)
    }

    /// Read one final block from a stream of concatenated blocks.
    ///
    /// The block's working state is `prior` with this block's summary
    /// folded in. Transactions are parsed structurally; use
    /// [`FinalBlock::from_buffer_sound`] when the source is untrusted.
    pub fn from_buffer(
        buffer: &mut InputBuffer<'_>,
        prior: &ChainState,
        mode: AppMode,
    ) -> ChainResult<Self> {
        Self::parse(buffer, prior, mode, None::<&NoKeys>)
    }

    /// Read one final block, soundness-checking every transaction.
    pub fn from_buffer_sound(
        buffer: &mut InputBuffer<'_>,
        prior: &ChainState,
        keys: &impl KeySource,
        mode: AppMode,
    ) -> ChainResult<Self> {
        Self::parse(buffer, prior, mode, Some(keys))
    }

    fn parse(
        buffer: &mut InputBuffer<'_>,
        prior: &ChainState,
        mode: AppMode,
        keys: Option<&impl KeySource>,
    ) -> ChainResult<Self> {
        let block_start = buffer.offset();

        let version = buffer.next_u8()?;
        if version != BLOCK_VERSION {
            return Err(ChainError::BadBlockVersion { version });
        }
        let block_time_ms = buffer.next_u64()?;
        let num_bytes = buffer.next_u64()?;
        let prev_hash = buffer.next_hash()?;
        let merkle_root = buffer.next_hash()?;
        let tx_size = buffer.next_u64()? as usize;
        let sum_size = buffer.next_u64()? as usize;
        let val_count = buffer.next_u32()? as usize;

        let mut transactions = Vec::new();
        let tx_start = buffer.offset();
        while buffer.offset() - tx_start < tx_size {
            let tx = Transaction::from_buffer(buffer, mode)?;
            if let Some(keys) = keys {
                tx.is_sound(keys)?;
            }
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
        let summary = Summary::from_buffer(buffer)?;
        if buffer.offset() - sum_start != sum_size {
            return Err(ChainError::MalformedBlock(format!(
                "summary section misaligned at {} of {} bytes",
                buffer.offset() - sum_start,
                sum_size
            )));
        }

        let validations = Validation::from_buffer(buffer)?;
        if validations.len() != val_count {
            return Err(ChainError::MalformedBlock(format!(
                "validation count mismatch: header {val_count}, section {}",
                validations.len()
            )));
        }

        let consumed = (buffer.offset() - block_start) as u64;
        if consumed != num_bytes {
            return Err(ChainError::WrongBlockSize {
                expected: num_bytes,
                actual: consumed,
            });
        }

        let mut block_state = prior.clone();
        block_state.apply_summary(&summary, block_time_ms);
        block_state.mature_pending(block_time_ms);

        Ok(Self {
            version,
            block_time_ms,
            prev_hash,
            merkle_root,
            transactions,
            summary,
            validations,
            block_state,
        })
    }

    /// Serialized size of the transaction section.
    pub fn tx_size(&self) -> usize {
        self.transactions.iter().map(Transaction::byte_size).sum()
    }

    /// Total serialized size.
    pub fn byte_size(&self) -> usize {
        FINAL_BLOCK_MIN_SIZE
            + self.tx_size()
            + self.summary.byte_size()
            + self.validations.byte_size()
    }

    /// The canonical encoding.
    pub fn canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_size());
        out.push(self.version);
        push_u64(&mut out, self.block_time_ms);
        push_u64(&mut out, self.byte_size() as u64);
        out.extend_from_slice(&self.prev_hash);
        out.extend_from_slice(&self.merkle_root);
        push_u64(&mut out, self.tx_size() as u64);
        push_u64(&mut out, self.summary.byte_size() as u64);
        push_u32(&mut out, self.validations.len() as u32);
        for tx in &self.transactions {
            out.extend_from_slice(&tx.canonical());
        }
        out.extend_from_slice(&self.summary.canonical());
        out.extend_from_slice(&self.validations.canonical());
        out
    }

    /// SHA-256 of the canonical encoding; the next block's `prev_hash`.
    pub fn hash(&self) -> Hash {
        sha256(&self.canonical())
    }

    /// Milliseconds-since-epoch finalization time.
    pub fn block_time_ms(&self) -> u64 {
        self.block_time_ms
    }

    /// Hash of the previous block.
    pub fn prev_hash(&self) -> &Hash {
        &self.prev_hash
    }

    /// Merkle root over the transactions.
    pub fn merkle_root(&self) -> &Hash {
        &self.merkle_root
    }

    /// The finalized transactions.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Number of finalized transactions.
    pub fn num_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// The block summary.
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// The validation signatures that finalized the block.
    pub fn validations(&self) -> &Validation {
        &self.validations
    }

    /// Chain state after this block.
    pub fn chain_state(&self) -> &ChainState {
        &self.block_state
    }
}

/// Placeholder so the keyless parse path can name a `KeySource` type.
struct NoKeys;

impl KeySource for NoKeys {
    fn public_key(&self, _: &devv_primitives::Address) -> Option<devv_crypto::PublicKey> {
        None
    }

    fn is_inn(&self, _: &devv_primitives::Address) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devv_keys::KeyRing;
    use devv_primitives::{Operation, Tier2Transaction, Transfer};

    fn sealed_block(keys: &KeyRing, nonce: u64) -> FinalBlock {
        let inn = keys.inn_address().clone();
        let wallet = keys.wallet_address(0).unwrap().clone();
        let tx: Transaction = Tier2Transaction::new(
            Operation::Create,
            vec![
                Transfer::new(inn, 0, -9, 0),
                Transfer::new(wallet, 0, 9, 0),
            ],
            Tier2Transaction::nonce_bytes(nonce),
            keys.inn_key(),
        )
        .unwrap()
        .into();

        let mut state = ChainState::new();
        let mut summary = Summary::new();
        crate::validity::apply_transaction(&tx, &mut state, &mut summary).unwrap();

        let mut proposal =
            ProposedBlock::build(devv_crypto::genesis_hash(), vec![tx], summary, state);
        proposal
            .sign(
                keys.node_address(0).unwrap().clone(),
                keys.node_key(0).unwrap(),
            )
            .unwrap();
        FinalBlock::seal(proposal, 42_000)
    }

    #[test]
    fn test_seal_and_roundtrip() {
        let keys = KeyRing::generate(3, 1, 1);
        let block = sealed_block(&keys, 1);

        let bytes = block.canonical();
        assert_eq!(bytes.len(), block.byte_size());

        let mut buffer = InputBuffer::new(&bytes);
        let parsed =
            FinalBlock::from_buffer_sound(&mut buffer, &ChainState::new(), &keys, AppMode::Tier2)
                .unwrap();
        assert!(!buffer.has_remaining());
        assert_eq!(parsed.canonical(), bytes);
        assert_eq!(parsed.block_time_ms(), 42_000);
        assert_eq!(parsed.merkle_root(), block.merkle_root());
    }

    #[test]
    fn test_merkle_root_covers_transactions() {
        let keys = KeyRing::generate(3, 1, 1);
        let a = sealed_block(&keys, 1);
        let b = sealed_block(&keys, 2); // different nonce, different txs
        assert_ne!(a.merkle_root(), b.merkle_root());
        assert_eq!(
            *a.merkle_root(),
            FinalBlock::compute_merkle(a.transactions())
        );
    }

    #[test]
    fn test_stream_parse_consumes_exactly_one_block() {
        let keys = KeyRing::generate(3, 1, 1);
        let first = sealed_block(&keys, 1);
        let second = sealed_block(&keys, 2);

        let mut stream = first.canonical();
        stream.extend_from_slice(&second.canonical());

        let mut buffer = InputBuffer::new(&stream);
        let parsed_first =
            FinalBlock::from_buffer(&mut buffer, &ChainState::new(), AppMode::Tier2).unwrap();
        let parsed_second =
            FinalBlock::from_buffer(&mut buffer, parsed_first.chain_state(), AppMode::Tier2)
                .unwrap();

        assert!(!buffer.has_remaining());
        assert_eq!(parsed_first.canonical(), first.canonical());
        assert_eq!(parsed_second.canonical(), second.canonical());
    }

    #[test]
    fn test_parse_folds_summary_into_state() {
        let keys = KeyRing::generate(3, 1, 1);
        let block = sealed_block(&keys, 1);
        let bytes = block.canonical();

        let mut buffer = InputBuffer::new(&bytes);
        let parsed = FinalBlock::from_buffer(&mut buffer, &ChainState::new(), AppMode::Tier2).unwrap();
        assert_eq!(
            parsed.chain_state().amount(0, keys.wallet_address(0).unwrap()),
            9
        );
    }

    #[test]
    fn test_truncated_block_rejected() {
        let keys = KeyRing::generate(3, 1, 1);
        let bytes = sealed_block(&keys, 1).canonical();
        let mut buffer = InputBuffer::new(&bytes[..bytes.len() - 4]);
        assert!(FinalBlock::from_buffer(&mut buffer, &ChainState::new(), AppMode::Tier2).is_err());
    }
}
