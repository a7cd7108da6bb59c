//! In-shard consensus message handlers.

use devv_bus::{log_message_summary, Message, MessagePublisher, MessageType, ShardContext};
use devv_chain::{Blockchain, ProposedBlock};
use devv_keys::KeyRing;
use devv_pool::{PoolError, TransactionPool};
use devv_primitives::ProtocolError;
use tracing::{debug, info, warn};

use crate::errors::ConsensusResult;

/// Message index a proposal at `height` is tagged with, unique per node.
fn proposal_index(height: u64, ctx: &ShardContext) -> u32 {
    ((height + 1) + (ctx.node_index() as u64 + 1) * 1_000_000) as u32
}

/// The proposal this node should put on the wire for the next height.
///
/// A proposal carried forward from an earlier round (re-anchored after a
/// peer finalization) is emitted as-is; otherwise a fresh one is built
/// from the pending buffer. Returns `None` when there is nothing to
/// propose or no pending transaction validates against the current state.
pub fn create_next_proposal(
    keys: &KeyRing,
    chain: &Blockchain,
    pool: &mut TransactionPool,
    ctx: &ShardContext,
) -> ConsensusResult<Option<Message>> {
    let height = chain.len() as u64;
    if height % 100 == 0 {
        info!(height, "processing at chain height");
    }

    if !pool.has_proposal() {
        if !pool.has_pending() {
            return Ok(None);
        }
        match pool.propose_block(
            chain.expected_prev_hash(),
            chain.highest_chain_state(),
            keys,
            ctx,
        ) {
            Ok(_) => {}
            // Nothing in the buffer validated this round; stay idle.
            Err(PoolError::Protocol(ProtocolError::EmptySummary)) => return Ok(None),
            Err(error) => return Err(error.into()),
        }
    }

    let bytes = pool
        .proposal_canonical()
        .expect("an outstanding proposal was just ensured");
    info!(height = height + 1, "proposal for next height");
    Ok(Some(Message::new(
        ctx.shard_uri(),
        MessageType::ProposalBlock,
        bytes,
        proposal_index(height, ctx),
    )))
}

/// Validator-worker path: pool announced transactions and, on this node's
/// leader turn, emit a proposal.
pub fn handle_transaction_announcement<P: MessagePublisher>(
    message: &Message,
    ctx: &ShardContext,
    keys: &KeyRing,
    chain: &Blockchain,
    pool: &mut TransactionPool,
    publish: &P,
) -> ConsensusResult<bool> {
    log_message_summary(message, "handle_transaction_announcement");

    if let Err(error) = pool.add_transactions(&message.payload, keys) {
        warn!(%error, "transaction batch rejected");
    }

    // Propose only when no proposal is outstanding; the outstanding one
    // is re-emitted on the final-block path instead of on every
    // announcement.
    if ctx.is_leader_turn(chain.len() as u64) && !pool.has_proposal() {
        if let Some(proposal) = create_next_proposal(keys, chain, pool, ctx)? {
            publish.publish(proposal);
            return Ok(true);
        }
    }
    Ok(false)
}

/// Consensus-worker path for a peer's proposal: validate it, co-sign the
/// summary, and answer with a VALID message.
pub fn handle_proposal_block<P: MessagePublisher>(
    message: &Message,
    ctx: &ShardContext,
    keys: &KeyRing,
    chain: &Blockchain,
    publish: &P,
) -> ConsensusResult<bool> {
    log_message_summary(message, "handle_proposal_block");

    let mut block = ProposedBlock::from_bytes(
        &message.payload,
        chain.highest_chain_state(),
        keys,
        ctx.mode(),
    )?;
    block.validate(keys)?;

    let peer = ctx.peer_index();
    let node_addr = keys.node_address(peer)?.clone();
    block.sign(node_addr.clone(), keys.node_key(peer)?)?;
    let payload = block
        .validation_payload(&node_addr)
        .expect("own signature was just attached");

    debug!("proposed block is valid");
    publish.publish(Message::new(
        ctx.shard_uri(),
        MessageType::Valid,
        payload,
        message.index,
    ));
    Ok(true)
}

/// Consensus-worker path for a VALID message: leader only. Once the
/// threshold is crossed, finalize locally, append to the chain, and
/// broadcast the FINAL_BLOCK.
pub fn handle_validation<P: MessagePublisher>(
    message: &Message,
    ctx: &ShardContext,
    keys: &KeyRing,
    chain: &mut Blockchain,
    pool: &mut TransactionPool,
    publish: &P,
) -> ConsensusResult<bool> {
    log_message_summary(message, "handle_validation");

    if !pool.check_validation(&message.payload, ctx, keys)? {
        return Ok(false);
    }

    debug!("ready to finalize block");
    let block = pool.finalize_local_block()?;
    let bytes = block.canonical();
    chain.push_back(block)?;
    info!(
        height = chain.len(),
        txs = chain.num_transactions(),
        elapsed_ms = pool.elapsed_ms(),
        "chain extended by local block"
    );

    publish.publish(Message::new(
        ctx.shard_uri(),
        MessageType::FinalBlock,
        bytes,
        message.index,
    ));
    Ok(true)
}

/// Consensus-worker path for a peer's FINAL_BLOCK: verify and append it,
/// re-anchor any outstanding proposal, and when pending work remains on
/// this node's leader turn, put the next proposal on the wire.
pub fn handle_final_block<P: MessagePublisher>(
    message: &Message,
    ctx: &ShardContext,
    keys: &KeyRing,
    chain: &mut Blockchain,
    pool: &mut TransactionPool,
    publish: &P,
) -> ConsensusResult<bool> {
    log_message_summary(message, "handle_final_block");

    // The broadcast fans out to the sender too; a block that is already
    // the chain tail (its hash is the expected prev-hash) is a replay.
    if devv_crypto::sha256(&message.payload) == chain.expected_prev_hash() {
        debug!("final block already applied");
        return Ok(false);
    }

    let block =
        pool.finalize_remote_block(&message.payload, chain.highest_chain_state(), keys, ctx)?;
    chain.push_back(block)?;
    info!(
        height = chain.len(),
        txs = chain.num_transactions(),
        elapsed_ms = pool.elapsed_ms(),
        "chain extended by peer block"
    );

    if pool.has_proposal() {
        pool.reverify_proposal(
            chain.expected_prev_hash(),
            chain.highest_chain_state(),
            keys,
            ctx,
        )?;
    }

    if !pool.has_pending() && !pool.has_proposal() {
        debug!("all pending transactions processed");
        return Ok(false);
    }
    if !ctx.is_leader_turn(chain.len() as u64) {
        debug!("pending work but not this node's turn");
        return Ok(false);
    }

    // Our turn: the carried-forward proposal, or a fresh one.
    if let Some(proposal) = create_next_proposal(keys, chain, pool, ctx)? {
        publish.publish(proposal);
        return Ok(true);
    }
    Ok(false)
}
