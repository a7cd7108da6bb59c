//! Cross-shard block exchange.
//!
//! Shards learn about each other through two messages: a node asks
//! `GET_BLOCKS_SINCE(height, requester)` and is answered either with raw
//! block bytes (`BLOCKS_SINCE`, a Tier-1 chain answering a shard) or with
//! a stream of Tier-1 transactions rebuilt from local blocks (a shard
//! answering the Tier-1 chain). Incoming remote blocks are projected into
//! local state only for this shard's designated wallets.

use std::time::{SystemTime, UNIX_EPOCH};

use devv_bus::{log_message_summary, Message, MessagePublisher, MessageType, ShardContext};
use devv_chain::{Blockchain, ChainState, FinalBlock};
use devv_keys::KeyRing;
use devv_primitives::buffers::push_u64;
use devv_primitives::{AppMode, InputBuffer, Tier1Transaction};
use tracing::{debug, info, warn};

use crate::errors::{ConsensusError, ConsensusResult};

/// Answer a peer shard's catch-up request.
///
/// Tier-2 processes rebuild each requested block as one Tier-1
/// transaction carrying the block's first validation signature and
/// announce the batch to the requester. Tier-1 processes reply with the
/// raw dump prefixed by the covered height.
pub fn handle_blocks_since_request<P: MessagePublisher>(
    message: &Message,
    ctx: &ShardContext,
    keys: &KeyRing,
    chain: &Blockchain,
    publish: &P,
) -> ConsensusResult<bool> {
    log_message_summary(message, "handle_blocks_since_request");
    if message.payload.len() < 16 {
        return Err(ConsensusError::PayloadTooSmall {
            message_type: "GET_BLOCKS_SINCE",
            size: message.payload.len(),
        });
    }

    let mut buffer = InputBuffer::new(&message.payload);
    let height = buffer.next_u64()?;
    let requester = buffer.next_u64()?;
    info!(height, requester, "blocks-since request");

    let raw = chain.partial_binary_dump(height);

    match ctx.mode() {
        AppMode::Tier2 => {
            let mut tier1_data = Vec::new();
            let mut buffer = InputBuffer::new(&raw);
            let mut prior = ChainState::new();
            while buffer.has_remaining() {
                let block = FinalBlock::from_buffer(&mut buffer, &prior, AppMode::Tier2)?;
                let Some((node_addr, signature)) = block.validations().first() else {
                    warn!("final block without validations in dump");
                    continue;
                };
                let tx = Tier1Transaction::new(
                    block.summary().clone(),
                    node_addr.clone(),
                    signature.clone(),
                )?;
                tx.is_sound(keys)?;
                tier1_data.extend_from_slice(&tx.canonical());
                prior = block.chain_state().clone();
            }
            publish.publish(Message::new(
                ShardContext::node_uri(requester as usize),
                MessageType::TransactionAnnouncement,
                tier1_data,
                message.index,
            ));
            Ok(true)
        }
        AppMode::Tier1 => {
            let covered_height = (chain.len() as u64).saturating_sub(1);
            let mut payload = Vec::with_capacity(8 + raw.len());
            push_u64(&mut payload, covered_height);
            payload.extend_from_slice(&raw);
            publish.publish(Message::new(
                ShardContext::node_uri(requester as usize),
                MessageType::BlocksSince,
                payload,
                message.index,
            ));
            Ok(true)
        }
    }
}

/// Project a remote chain's blocks into local state.
///
/// Only transfers addressed to this shard's designated wallets are
/// credited, and delayed credits only once their delay has elapsed
/// relative to the block time. Advances the watermark that throttles
/// future requests.
pub fn handle_blocks_since(
    message: &Message,
    ctx: &ShardContext,
    keys: &KeyRing,
    chain: &mut Blockchain,
    remote_blocks: &mut u64,
) -> ConsensusResult<bool> {
    log_message_summary(message, "handle_blocks_since");
    if message.payload.len() < 8 {
        return Err(ConsensusError::PayloadTooSmall {
            message_type: "BLOCKS_SINCE",
            size: message.payload.len(),
        });
    }

    let mut buffer = InputBuffer::new(&message.payload);
    let covered_height = buffer.next_u64()?;

    if ctx.mode() == AppMode::Tier2 {
        let wallets = keys.designated_wallets(ctx.shard_index());
        let mut prior = ChainState::new();
        while buffer.has_remaining() {
            let block = FinalBlock::from_buffer(&mut buffer, &prior, AppMode::Tier1)?;
            let elapsed = now_ms().saturating_sub(block.block_time_ms());
            for addr in &wallets {
                for (coin, amount) in block.summary().coins_for_address(addr, elapsed) {
                    chain.apply_remote_credit(addr, coin, amount);
                }
            }
            prior = block.chain_state().clone();
        }
        if covered_height > *remote_blocks {
            *remote_blocks = covered_height;
        }
        info!(covered_height, "local state updated from remote chain");
    }
    Ok(false)
}

/// Ask remote shards for blocks when the local chain has outgrown the
/// watermark. Tier-2 asks the Tier-1 node sharing its peer index; Tier-1
/// asks that index in each live shard.
pub fn request_remote_blocks<P: MessagePublisher>(
    ctx: &ShardContext,
    chain_height: u64,
    remote_blocks: &mut u64,
    publish: &P,
) -> bool {
    if *remote_blocks >= chain_height {
        return false;
    }

    let mut request = Vec::with_capacity(16);
    push_u64(&mut request, *remote_blocks);
    push_u64(&mut request, ctx.node_index() as u64);
    let index = *remote_blocks as u32;

    match ctx.mode() {
        AppMode::Tier1 => {
            // Shard 0 is the Tier-1 chain itself; ask its own peer index
            // in each shard above it.
            for shard in 1..=2 {
                let target = shard * ctx.peer_count() + ctx.peer_index();
                publish.publish(Message::new(
                    ShardContext::node_uri(target),
                    MessageType::GetBlocksSince,
                    request.clone(),
                    index,
                ));
            }
        }
        AppMode::Tier2 => {
            let target = ctx.peer_index();
            publish.publish(Message::new(
                ShardContext::node_uri(target),
                MessageType::GetBlocksSince,
                request.clone(),
                index,
            ));
        }
    }

    debug!(since = *remote_blocks, "requested remote blocks");
    *remote_blocks = chain_height;
    true
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devv_bus::RecordingBus;
    use devv_chain::ProposedBlock;
    use devv_primitives::{Operation, Summary, Tier2Transaction, Transaction, Transfer};

    fn t2_chain_with_blocks(keys: &KeyRing, blocks: usize) -> Blockchain {
        let mut chain = Blockchain::new("t2");
        for nonce in 0..blocks as u64 {
            let inn = keys.inn_address().clone();
            let wallet = keys.wallet_address(0).unwrap().clone();
            let tx: Transaction = Tier2Transaction::new(
                Operation::Create,
                vec![
                    Transfer::new(inn, 0, -5, 0),
                    Transfer::new(wallet, 0, 5, 0),
                ],
                Tier2Transaction::nonce_bytes(nonce + 1),
                keys.inn_key(),
            )
            .unwrap()
            .into();

            let mut state = chain.highest_chain_state().clone();
            let mut summary = Summary::new();
            devv_chain::apply_transaction(&tx, &mut state, &mut summary).unwrap();
            let mut proposal =
                ProposedBlock::build(chain.expected_prev_hash(), vec![tx], summary, state);
            proposal
                .sign(
                    keys.node_address(0).unwrap().clone(),
                    keys.node_key(0).unwrap(),
                )
                .unwrap();
            chain
                .push_back(devv_chain::FinalBlock::seal(proposal, 1_000 + nonce))
                .unwrap();
        }
        chain
    }

    fn request(height: u64, requester: u64) -> Message {
        let mut payload = Vec::new();
        push_u64(&mut payload, height);
        push_u64(&mut payload, requester);
        Message::new("RemoteURI-0", MessageType::GetBlocksSince, payload, 7)
    }

    #[test]
    fn test_t2_answers_with_tier1_transactions() {
        let keys = KeyRing::generate(3, 2, 1);
        let ctx = ShardContext::new(0, 1, AppMode::Tier2);
        let chain = t2_chain_with_blocks(&keys, 3);
        let bus = RecordingBus::new();

        handle_blocks_since_request(&request(1, 4), &ctx, &keys, &chain, &bus).unwrap();

        let mut outbox = bus.take();
        assert_eq!(outbox.len(), 1);
        let answer = outbox.pop().unwrap();
        assert_eq!(answer.uri, "RemoteURI-4");
        assert_eq!(answer.message_type, MessageType::TransactionAnnouncement);

        // Two blocks above height 1, so two Tier-1 transactions.
        let mut buffer = InputBuffer::new(&answer.payload);
        let mut parsed = 0;
        while buffer.has_remaining() {
            let tx = Tier1Transaction::from_buffer_sound(&mut buffer, &keys).unwrap();
            assert_eq!(keys.node_index(tx.node_address()), Some(0));
            parsed += 1;
        }
        assert_eq!(parsed, 2);
    }

    #[test]
    fn test_t1_answers_with_raw_dump() {
        let keys = KeyRing::generate(3, 2, 1);
        let ctx = ShardContext::new(0, 0, AppMode::Tier1);
        let chain = t2_chain_with_blocks(&keys, 2);
        let bus = RecordingBus::new();

        handle_blocks_since_request(&request(0, 1), &ctx, &keys, &chain, &bus).unwrap();

        let answer = bus.take().pop().unwrap();
        assert_eq!(answer.message_type, MessageType::BlocksSince);
        let mut buffer = InputBuffer::new(&answer.payload);
        assert_eq!(buffer.next_u64().unwrap(), 1); // covered height
        assert_eq!(buffer.remaining(), chain.binary_dump().len());
    }

    #[test]
    fn test_short_request_rejected() {
        let keys = KeyRing::generate(1, 1, 1);
        let ctx = ShardContext::new(0, 0, AppMode::Tier2);
        let chain = Blockchain::new("t2");
        let bus = RecordingBus::new();

        let short = Message::new("RemoteURI-0", MessageType::GetBlocksSince, vec![0; 8], 0);
        assert!(matches!(
            handle_blocks_since_request(&short, &ctx, &keys, &chain, &bus),
            Err(ConsensusError::PayloadTooSmall { .. })
        ));
    }

    #[test]
    fn test_blocks_since_projects_designated_wallets() {
        let keys = KeyRing::generate(3, 2, 1);
        let ctx = ShardContext::new(0, 0, AppMode::Tier2);

        // One Tier-1 block whose summary credits wallet 0.
        let wallet = keys.wallet_address(0).unwrap().clone();
        let mut t1_summary = Summary::new();
        t1_summary.add_item(keys.inn_address(), 0, -7, 0);
        t1_summary.add_item(&wallet, 0, 7, 0);
        let t1_tx: Transaction = Tier1Transaction::create(
            t1_summary,
            keys.node_address(0).unwrap().clone(),
            keys.node_key(0).unwrap(),
        )
        .unwrap()
        .into();

        let mut state = ChainState::new();
        let mut block_summary = Summary::new();
        devv_chain::apply_transaction(&t1_tx, &mut state, &mut block_summary).unwrap();
        let mut proposal = ProposedBlock::build(
            devv_crypto::genesis_hash(),
            vec![t1_tx],
            block_summary,
            state,
        );
        proposal
            .sign(
                keys.node_address(0).unwrap().clone(),
                keys.node_key(0).unwrap(),
            )
            .unwrap();
        let t1_block = devv_chain::FinalBlock::seal(proposal, 1_000);

        let mut payload = Vec::new();
        push_u64(&mut payload, 5);
        payload.extend_from_slice(&t1_block.canonical());
        let message = Message::new("RemoteURI-0", MessageType::BlocksSince, payload, 0);

        let mut chain = Blockchain::new("local");
        let mut watermark = 0;
        handle_blocks_since(&message, &ctx, &keys, &mut chain, &mut watermark).unwrap();

        assert_eq!(chain.highest_chain_state().amount(0, &wallet), 7);
        // The INN debit is not projected; only designated wallets are.
        assert_eq!(chain.highest_chain_state().amount(0, keys.inn_address()), 0);
        assert_eq!(watermark, 5);
    }

    #[test]
    fn test_request_remote_blocks_throttles() {
        let ctx = ShardContext::new(1, 1, AppMode::Tier2);
        let bus = RecordingBus::new();
        let mut watermark = 0;

        assert!(request_remote_blocks(&ctx, 3, &mut watermark, &bus));
        assert_eq!(watermark, 3);
        let sent = bus.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].uri, "RemoteURI-1");

        // No growth, no request.
        assert!(!request_remote_blocks(&ctx, 3, &mut watermark, &bus));
        assert!(bus.is_empty());
    }

    #[test]
    fn test_t1_requests_fan_out() {
        let ctx = ShardContext::new(2, 0, AppMode::Tier1);
        let bus = RecordingBus::new();
        let mut watermark = 0;

        request_remote_blocks(&ctx, 1, &mut watermark, &bus);
        let sent = bus.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].uri, "RemoteURI-5"); // shard 1, peer index 2
        assert_eq!(sent[1].uri, "RemoteURI-8"); // shard 2, peer index 2
    }
}
