//! The transaction pool and per-height state machine.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rayon::prelude::*;

use devv_bus::ShardContext;
use devv_chain::{
    apply_in_aggregate, AggregateMap, ChainState, FinalBlock, ProposedBlock,
};
use devv_crypto::Hash;
use devv_keys::KeyRing;
use devv_primitives::{
    Address, AppMode, InputBuffer, KeySource, ProtocolError, Signature, Summary, Transaction,
};
use tracing::{debug, info, warn};

use crate::errors::{PoolError, PoolResult};
use crate::stats::PoolStats;

/// Pending transactions and the outstanding proposal for one validator.
///
/// A node holds at most one outstanding proposal; transactions that
/// arrive while one is outstanding wait in the pending buffer for the
/// next round. The buffer is keyed by signature, so replays collapse and
/// iteration order is deterministic.
pub struct TransactionPool {
    mode: AppMode,
    batch_size: usize,
    pending: BTreeMap<Signature, Transaction>,
    proposal: Option<ProposedBlock>,
    /// Signatures that reached a final block. Re-announced duplicates and
    /// transactions subsumed by a peer's block are dropped against this
    /// set.
    finalized: BTreeSet<Signature>,
    stats: PoolStats,
    started_at: Instant,
}

impl TransactionPool {
    /// An empty pool.
    pub fn new(mode: AppMode, batch_size: usize) -> Self {
        Self {
            mode,
            batch_size: batch_size.max(1),
            pending: BTreeMap::new(),
            proposal: None,
            finalized: BTreeSet::new(),
            stats: PoolStats::default(),
            started_at: Instant::now(),
        }
    }

    /// A pool configured from the shard context.
    pub fn from_context(ctx: &ShardContext) -> Self {
        Self::new(ctx.mode(), ctx.batch_size())
    }

    /// Parse a batch frame of transactions and pool the sound ones.
    ///
    /// Soundness runs in parallel across the batch. A parse failure drops
    /// the whole remaining batch; soundness failures drop only their
    /// transaction. Returns how many transactions entered the buffer.
    pub fn add_transactions(&mut self, data: &[u8], keys: &KeyRing) -> PoolResult<usize> {
        let mut parsed = Vec::new();
        let mut buffer = InputBuffer::new(data);
        while buffer.has_remaining() {
            match Transaction::from_buffer(&mut buffer, self.mode) {
                Ok(tx) => parsed.push(tx),
                Err(error) => {
                    self.stats.rejected_malformed += 1;
                    warn!(%error, "dropping transaction batch");
                    return Err(error.into());
                }
            }
        }

        let checked: Vec<(Transaction, Result<(), ProtocolError>)> = parsed
            .into_par_iter()
            .map(|tx| {
                let soundness = tx.is_sound(keys);
                (tx, soundness)
            })
            .collect();

        let mut accepted = 0;
        for (tx, soundness) in checked {
            match soundness {
                Ok(()) => {
                    let sig = tx.signature().clone();
                    if self.pending.contains_key(&sig) || self.finalized.contains(&sig) {
                        self.stats.duplicate += 1;
                    } else {
                        self.pending.insert(sig, tx);
                        self.stats.accepted += 1;
                        accepted += 1;
                    }
                }
                Err(error) => {
                    debug!(%error, "dropping unsound transaction");
                    self.stats.record_soundness_error(&error);
                }
            }
        }
        Ok(accepted)
    }

    /// Whether any transactions await proposal.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of transactions awaiting proposal.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a locally built proposal is outstanding.
    pub fn has_proposal(&self) -> bool {
        self.proposal.is_some()
    }

    /// Canonical bytes of the outstanding proposal.
    pub fn proposal_canonical(&self) -> Option<Vec<u8>> {
        self.proposal.as_ref().map(ProposedBlock::canonical)
    }

    /// The rejection/acceptance counters.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Milliseconds since the pool was created; throughput logging.
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Build a proposal on this node's leader turn.
    ///
    /// Up to `batch_size` pending transactions fold into a snapshot of
    /// `prior` through the committed-debit aggregate; the set of accepted
    /// transactions is therefore independent of fold order. Transactions
    /// invalid against the snapshot stay pending for later rounds. The
    /// local node's signature is attached as the first validation.
    pub fn propose_block(
        &mut self,
        prev_hash: Hash,
        prior: &ChainState,
        keys: &KeyRing,
        ctx: &ShardContext,
    ) -> PoolResult<Vec<u8>> {
        let mut snapshot = prior.clone();
        let mut summary = Summary::new();
        let mut aggregate = AggregateMap::new();
        let mut accepted = Vec::new();

        let candidates: Vec<Signature> =
            self.pending.keys().take(self.batch_size).cloned().collect();
        for sig in candidates {
            let tx = &self.pending[&sig];
            match apply_in_aggregate(tx, &mut snapshot, &mut summary, &mut aggregate, prior) {
                Ok(()) => {
                    let tx = self.pending.remove(&sig).expect("candidate is pending");
                    accepted.push(tx);
                }
                Err(error) => {
                    debug!(%error, "transaction left pending this round");
                    self.stats.record_validity_error(&error);
                }
            }
        }

        if accepted.is_empty() {
            return Err(ProtocolError::EmptySummary.into());
        }
        summary.check_sane()?;

        let mut proposal = ProposedBlock::build(prev_hash, accepted, summary, snapshot);
        let peer = ctx.peer_index();
        proposal.sign(keys.node_address(peer)?.clone(), keys.node_key(peer)?)?;

        info!(
            txs = proposal.num_transactions(),
            pending = self.pending.len(),
            "proposal built"
        );
        let bytes = proposal.canonical();
        self.proposal = Some(proposal);
        Ok(bytes)
    }

    /// Re-anchor the outstanding proposal after a peer finalized this
    /// height first.
    ///
    /// Transactions already finalized by the peer's block are dropped;
    /// the rest re-validate against the new state. The re-anchored
    /// proposal keeps only the local node's signature, since peer
    /// validations referenced the old chain tip. A fully subsumed
    /// proposal is discarded.
    pub fn reverify_proposal(
        &mut self,
        new_prev_hash: Hash,
        new_state: &ChainState,
        keys: &KeyRing,
        ctx: &ShardContext,
    ) -> PoolResult<()> {
        let Some(proposal) = self.proposal.take() else {
            return Ok(());
        };
        let (_, transactions, _, _, _) = proposal.into_parts();

        let mut snapshot = new_state.clone();
        let mut summary = Summary::new();
        let mut aggregate = AggregateMap::new();
        let mut kept = Vec::new();

        for tx in transactions {
            if self.finalized.contains(tx.signature()) {
                continue;
            }
            match apply_in_aggregate(&tx, &mut snapshot, &mut summary, &mut aggregate, new_state) {
                Ok(()) => kept.push(tx),
                Err(error) => {
                    debug!(%error, "transaction dropped on re-anchor");
                    self.stats.record_validity_error(&error);
                }
            }
        }

        if kept.is_empty() {
            info!("proposal fully subsumed by peer block");
            return Ok(());
        }

        let mut proposal = ProposedBlock::build(new_prev_hash, kept, summary, snapshot);
        let peer = ctx.peer_index();
        proposal.sign(keys.node_address(peer)?.clone(), keys.node_key(peer)?)?;
        info!(txs = proposal.num_transactions(), "proposal re-anchored");
        self.proposal = Some(proposal);
        Ok(())
    }

    /// Ingest a peer's VALID message on the leader.
    ///
    /// The payload is `prev_hash || node_address || node_signature`. A
    /// hash that does not match the outstanding proposal, an unknown
    /// signer, or a failing signature is ignored without advancing the
    /// count; replays collapse in the address-keyed map. Returns `true`
    /// once the proposal holds enough signatures to finalize.
    pub fn check_validation(
        &mut self,
        payload: &[u8],
        ctx: &ShardContext,
        keys: &KeyRing,
    ) -> PoolResult<bool> {
        let Some(proposal) = self.proposal.as_mut() else {
            return Ok(false);
        };

        let mut buffer = InputBuffer::new(payload);
        let incoming_hash = buffer.next_hash()?;
        if incoming_hash != *proposal.prev_hash() {
            // Typically a race between a validation and a new block; the
            // stray validation is ignored.
            debug!("validation hash does not match the outstanding proposal");
            return Ok(false);
        }

        let node_addr = Address::from_buffer(&mut buffer)?;
        let signature = Signature::from_buffer(&mut buffer)?;

        let Some(public_key) = keys.public_key(&node_addr) else {
            warn!(node = %node_addr, "validation from unknown node ignored");
            return Ok(false);
        };
        if public_key
            .verify_digest(&proposal.summary().digest(), signature.raw())
            .is_err()
        {
            warn!(node = %node_addr, "validation signature did not verify");
            return Ok(false);
        }

        proposal.add_validation(node_addr, signature);
        Ok(proposal.validations().len() >= ctx.finalize_signature_count())
    }

    /// Promote the outstanding proposal to a final block.
    pub fn finalize_local_block(&mut self) -> PoolResult<FinalBlock> {
        let proposal = self.proposal.take().ok_or(PoolError::NoProposal)?;
        let block = FinalBlock::seal(proposal, now_ms());
        for tx in block.transactions() {
            self.finalized.insert(tx.signature().clone());
        }
        info!(
            txs = block.num_transactions(),
            elapsed_ms = self.elapsed_ms(),
            "local block finalized"
        );
        Ok(block)
    }

    /// Verify and adopt a peer's final block.
    ///
    /// Every transaction must be sound and valid against `prior`, the
    /// carried summary must equal the recomputed aggregate, the
    /// validation threshold must be met, and every validation signature
    /// must verify. Any failure is fatal for this height. Pending
    /// transactions finalized by the block are dropped from the buffer.
    pub fn finalize_remote_block(
        &mut self,
        data: &[u8],
        prior: &ChainState,
        keys: &KeyRing,
        ctx: &ShardContext,
    ) -> PoolResult<FinalBlock> {
        let mut buffer = InputBuffer::new(data);
        let block = FinalBlock::from_buffer_sound(&mut buffer, prior, keys, self.mode)
            .map_err(|e| PoolError::InvalidFinalBlock {
                reason: e.to_string(),
            })?;
        if buffer.has_remaining() {
            return Err(PoolError::InvalidFinalBlock {
                reason: format!("{} trailing bytes", buffer.remaining()),
            });
        }

        // Re-run the aggregate fold and demand the identical summary.
        let mut check_state = prior.clone();
        let mut check_summary = Summary::new();
        let mut aggregate = AggregateMap::new();
        for tx in block.transactions() {
            apply_in_aggregate(tx, &mut check_state, &mut check_summary, &mut aggregate, prior)
                .map_err(|e| PoolError::InvalidFinalBlock {
                    reason: e.to_string(),
                })?;
        }
        if check_summary.canonical() != block.summary().canonical() {
            return Err(PoolError::InvalidFinalBlock {
                reason: "summary does not match its transactions".into(),
            });
        }
        block
            .summary()
            .check_sane()
            .map_err(|e| PoolError::InvalidFinalBlock {
                reason: e.to_string(),
            })?;

        let required = ctx.finalize_signature_count();
        if block.validations().len() < required {
            return Err(PoolError::InvalidFinalBlock {
                reason: format!(
                    "threshold not met: {} of {required} signatures",
                    block.validations().len()
                ),
            });
        }
        let digest = block.summary().digest();
        for (node_addr, signature) in block.validations().iter() {
            let public_key =
                keys.public_key(node_addr)
                    .ok_or_else(|| PoolError::InvalidFinalBlock {
                        reason: format!("validation from unknown node {node_addr}"),
                    })?;
            public_key
                .verify_digest(&digest, signature.raw())
                .map_err(|_| PoolError::InvalidFinalBlock {
                    reason: format!("validation signature from {node_addr} did not verify"),
                })?;
        }

        for tx in block.transactions() {
            let sig = tx.signature().clone();
            self.pending.remove(&sig);
            self.finalized.insert(sig);
        }

        info!(
            txs = block.num_transactions(),
            pending = self.pending.len(),
            "remote block finalized"
        );
        Ok(block)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
