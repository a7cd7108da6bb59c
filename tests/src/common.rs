//! A deterministic in-process shard.
//!
//! Runs every node's handlers synchronously and relays emitted messages
//! in FIFO order, so consensus rounds play out the same way every run.
//! Handler errors are dropped the way the real workers drop them; tests
//! observe outcomes through chain heights, balances, and pool counters.

use std::collections::VecDeque;
use std::sync::Arc;

use devv_bus::{Message, MessageType, RecordingBus, ShardContext};
use devv_chain::Blockchain;
use devv_consensus as consensus;
use devv_keys::KeyRing;
use devv_pool::{PoolStats, TransactionPool};
use devv_primitives::{AppMode, Operation, Tier2Transaction, Transfer};

/// One simulated validator.
pub struct TestNode {
    pub ctx: ShardContext,
    pub chain: Blockchain,
    pub pool: TransactionPool,
    pub remote_blocks: u64,
}

impl TestNode {
    fn new(index: usize, peer_count: usize) -> Self {
        let ctx = ShardContext::new(index, 0, AppMode::Tier2)
            .with_peer_count(peer_count)
            .with_batch_size(100);
        Self {
            chain: Blockchain::new(format!("node-{index}")),
            pool: TransactionPool::from_context(&ctx),
            remote_blocks: 0,
            ctx,
        }
    }

    /// Apply one message to this node, collecting whatever it emits.
    fn handle(&mut self, message: &Message, keys: &KeyRing, outbox: &RecordingBus) {
        let result = match message.message_type {
            MessageType::TransactionAnnouncement => consensus::handle_transaction_announcement(
                message,
                &self.ctx,
                keys,
                &self.chain,
                &mut self.pool,
                outbox,
            ),
            MessageType::ProposalBlock => {
                consensus::handle_proposal_block(message, &self.ctx, keys, &self.chain, outbox)
            }
            MessageType::Valid => consensus::handle_validation(
                message,
                &self.ctx,
                keys,
                &mut self.chain,
                &mut self.pool,
                outbox,
            ),
            MessageType::FinalBlock => consensus::handle_final_block(
                message,
                &self.ctx,
                keys,
                &mut self.chain,
                &mut self.pool,
                outbox,
            ),
            MessageType::GetBlocksSince => consensus::handle_blocks_since_request(
                message,
                &self.ctx,
                keys,
                &self.chain,
                outbox,
            ),
            MessageType::BlocksSince => consensus::handle_blocks_since(
                message,
                &self.ctx,
                keys,
                &mut self.chain,
                &mut self.remote_blocks,
            ),
            MessageType::RequestBlock => Ok(false),
        };
        // Data-driven handler failures are dropped, as in the workers.
        let _ = result;
    }
}

/// A full shard of `peer_count` nodes sharing one key ring.
pub struct TestShard {
    pub keys: Arc<KeyRing>,
    pub nodes: Vec<TestNode>,
    next_nonce: u64,
}

impl TestShard {
    /// A shard with the given peers and wallets.
    pub fn new(peer_count: usize, wallet_count: usize) -> Self {
        Self {
            keys: Arc::new(KeyRing::generate(peer_count, wallet_count, 1)),
            nodes: (0..peer_count).map(|i| TestNode::new(i, peer_count)).collect(),
            next_nonce: 0,
        }
    }

    /// A fresh nonce for a generated transaction.
    pub fn nonce(&mut self) -> Vec<u8> {
        self.next_nonce += 1;
        Tier2Transaction::nonce_bytes(self.next_nonce)
    }

    /// An INN Create minting `amount` of coin 0 to each given wallet.
    pub fn mint(&mut self, wallet_indices: &[usize], amount: i64) -> Tier2Transaction {
        let total = amount * wallet_indices.len() as i64;
        let mut transfers = vec![Transfer::new(self.keys.inn_address().clone(), 0, -total, 0)];
        for &i in wallet_indices {
            transfers.push(Transfer::new(
                self.keys.wallet_address(i).unwrap().clone(),
                0,
                amount,
                0,
            ));
        }
        let nonce = self.nonce();
        Tier2Transaction::new(Operation::Create, transfers, nonce, self.keys.inn_key()).unwrap()
    }

    /// A wallet-to-wallet Exchange of `amount` of coin 0.
    pub fn exchange(&mut self, from: usize, to: usize, amount: i64) -> Tier2Transaction {
        let nonce = self.nonce();
        Tier2Transaction::new(
            Operation::Exchange,
            vec![
                Transfer::new(self.keys.wallet_address(from).unwrap().clone(), 0, -amount, 0),
                Transfer::new(self.keys.wallet_address(to).unwrap().clone(), 0, amount, 0),
            ],
            nonce,
            self.keys.wallet_key(from).unwrap(),
        )
        .unwrap()
    }

    /// Wrap transactions into one announcement frame.
    pub fn announcement(txs: &[&Tier2Transaction]) -> Message {
        let mut payload = Vec::new();
        for tx in txs {
            payload.extend_from_slice(&tx.canonical());
        }
        Message::new("shard-0", MessageType::TransactionAnnouncement, payload, 1)
    }

    /// Deliver messages and relay everything they cause, FIFO, until the
    /// shard goes quiet.
    pub fn pump(&mut self, initial: Vec<Message>) {
        let mut queue: VecDeque<Message> = initial.into();
        while let Some(message) = queue.pop_front() {
            let keys = Arc::clone(&self.keys);
            for node in &mut self.nodes {
                let addressed_to_node = message.uri == node.ctx.own_uri();
                let broadcast = message.uri == node.ctx.shard_uri();
                if !addressed_to_node && !broadcast {
                    continue;
                }
                let outbox = RecordingBus::new();
                node.handle(&message, &keys, &outbox);
                queue.extend(outbox.take());
            }
        }
    }

    /// Announce transactions to the shard and run consensus to quiescence.
    pub fn run_round(&mut self, txs: &[&Tier2Transaction]) {
        self.pump(vec![Self::announcement(txs)]);
    }

    /// Chain height, asserting every node agrees.
    pub fn agreed_height(&self) -> usize {
        let height = self.nodes[0].chain.len();
        for node in &self.nodes {
            assert_eq!(node.chain.len(), height, "nodes diverged in height");
            assert_eq!(
                node.chain.expected_prev_hash(),
                self.nodes[0].chain.expected_prev_hash(),
                "nodes diverged in chain tail"
            );
        }
        height
    }

    /// Coin-0 balance of a wallet on node 0.
    pub fn wallet_balance(&self, wallet: usize) -> i64 {
        self.nodes[0]
            .chain
            .highest_chain_state()
            .amount(0, self.keys.wallet_address(wallet).unwrap())
    }

    /// Coin-0 balance of the INN on node 0.
    pub fn inn_balance(&self) -> i64 {
        self.nodes[0]
            .chain
            .highest_chain_state()
            .amount(0, self.keys.inn_address())
    }

    /// The pool counters of one node.
    pub fn stats(&self, node: usize) -> PoolStats {
        *self.nodes[node].pool.stats()
    }
}
