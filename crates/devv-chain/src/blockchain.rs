//! The append-only final chain.

use std::collections::HashMap;
use std::sync::Arc;

use devv_crypto::{genesis_hash, Hash};
use devv_primitives::{Address, Signature, Transaction};
use tracing::{debug, info};

use crate::chain_state::ChainState;
use crate::errors::{ChainError, ChainResult};
use crate::final_block::FinalBlock;

/// An ordered sequence of final blocks with the rolling chain state and a
/// transaction-signature index.
///
/// Appends happen only on the consensus path; readers see a consistent
/// tail through the surrounding lock.
pub struct Blockchain {
    name: String,
    blocks: Vec<Arc<FinalBlock>>,
    tail_hash: Hash,
    state: ChainState,
    tx_index: HashMap<Signature, u64>,
    num_transactions: usize,
}

impl Blockchain {
    /// An empty chain. `name` tags log lines when several chains coexist
    /// in one process.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            tail_hash: genesis_hash(),
            state: ChainState::new(),
            tx_index: HashMap::new(),
            num_transactions: 0,
        }
    }

    /// Append a finalized block.
    ///
    /// The block must chain onto the current tail; its summary folds into
    /// the rolling state and its transactions into the signature index.
    pub fn push_back(&mut self, block: FinalBlock) -> ChainResult<()> {
        if *block.prev_hash() != self.tail_hash {
            return Err(ChainError::PrevHashMismatch {
                height: self.blocks.len() as u64,
            });
        }

        let height = self.blocks.len() as u64;
        self.state.apply_summary(block.summary(), block.block_time_ms());
        self.state.mature_pending(block.block_time_ms());
        for tx in block.transactions() {
            self.tx_index.insert(tx.signature().clone(), height);
        }
        self.num_transactions += block.num_transactions();
        self.tail_hash = block.hash();

        debug!(
            chain = %self.name,
            height,
            txs = block.num_transactions(),
            "block appended"
        );
        if height % 100 == 0 {
            info!(chain = %self.name, height, total_txs = self.num_transactions, "chain progress");
        }

        self.blocks.push(Arc::new(block));
        Ok(())
    }

    /// Current chain height (number of final blocks).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the chain holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The hash the next block must carry as `prev_hash`.
    pub fn expected_prev_hash(&self) -> Hash {
        self.tail_hash
    }

    /// The newest block, if any.
    pub fn back(&self) -> Option<&Arc<FinalBlock>> {
        self.blocks.last()
    }

    /// The block at `height`, if finalized.
    pub fn at(&self, height: u64) -> Option<&Arc<FinalBlock>> {
        self.blocks.get(height as usize)
    }

    /// Merkle root of the newest block.
    pub fn highest_merkle_root(&self) -> Option<Hash> {
        self.blocks.last().map(|block| *block.merkle_root())
    }

    /// The rolling chain state after the newest block.
    pub fn highest_chain_state(&self) -> &ChainState {
        &self.state
    }

    /// Credit a cross-shard transfer directly into the rolling state.
    ///
    /// Used when projecting remote-shard blocks for designated wallets.
    pub fn apply_remote_credit(&mut self, addr: &Address, coin: u64, amount: i64) {
        self.state.add_coin(addr, coin, amount);
    }

    /// The height a transaction finalized at, if it is on the chain.
    pub fn tx_height(&self, sig: &Signature) -> Option<u64> {
        self.tx_index.get(sig).copied()
    }

    /// Total transactions across all blocks.
    pub fn num_transactions(&self) -> usize {
        self.num_transactions
    }

    /// Concatenated canonical bytes of every block at or above
    /// `from_height`. Answers cross-shard catch-up requests.
    pub fn partial_binary_dump(&self, from_height: u64) -> Vec<u8> {
        let mut out = Vec::new();
        for block in self.blocks.iter().skip(from_height as usize) {
            out.extend_from_slice(&block.canonical());
        }
        out
    }

    /// Concatenated canonical bytes of the whole chain.
    pub fn binary_dump(&self) -> Vec<u8> {
        self.partial_binary_dump(0)
    }

    /// Clone out every finalized transaction, oldest first.
    pub fn copy_transactions(&self) -> Vec<Transaction> {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions().iter().cloned())
            .collect()
    }
}

impl std::fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blockchain")
            .field("name", &self.name)
            .field("height", &self.blocks.len())
            .field("txs", &self.num_transactions)
            .finish()
    }
}
