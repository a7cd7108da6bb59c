//! Full consensus rounds across a three-node shard.

#[cfg(test)]
mod tests {
    use crate::common::TestShard;
    use devv_bus::{Message, MessageType, RecordingBus};
    use devv_consensus::{handle_final_block, handle_validation};
    use devv_primitives::InputBuffer;

    /// Mint then exchange: two rounds, rotating leaders, agreed state.
    #[test]
    fn test_create_then_exchange_round() {
        let mut shard = TestShard::new(3, 3);

        // Height 0: the INN mints 10 to each of wallets A, B, C.
        let mint = shard.mint(&[0, 1, 2], 10);
        shard.run_round(&[&mint]);
        assert_eq!(shard.agreed_height(), 1);
        assert_eq!(shard.inn_balance(), -30);
        assert_eq!(shard.wallet_balance(0), 10);

        // Height 1: A sends 4 to B; node 1 is the leader this round.
        let payment = shard.exchange(0, 1, 4);
        shard.run_round(&[&payment]);
        assert_eq!(shard.agreed_height(), 2);

        assert_eq!(shard.inn_balance(), -30);
        assert_eq!(shard.wallet_balance(0), 6);
        assert_eq!(shard.wallet_balance(1), 14);
        assert_eq!(shard.wallet_balance(2), 10);

        // Every finalized block kept the zero-sum invariant, and the
        // transaction index knows both transactions.
        for node in &shard.nodes {
            for height in 0..node.chain.len() as u64 {
                let block = node.chain.at(height).unwrap();
                assert_eq!(block.summary().total_delta(), 0);
            }
            assert_eq!(node.chain.tx_height(mint.signature()), Some(0));
            assert_eq!(node.chain.tx_height(payment.signature()), Some(1));
        }
    }

    /// Several rounds drain a backlog with the leader rotating each
    /// height.
    #[test]
    fn test_leader_rotation_drains_backlog() {
        let mut shard = TestShard::new(3, 2);
        let mint = shard.mint(&[0, 1], 100);
        shard.run_round(&[&mint]);

        for round in 0..4 {
            let payment = shard.exchange(round % 2, (round + 1) % 2, 5);
            shard.run_round(&[&payment]);
        }
        assert_eq!(shard.agreed_height(), 5);
        assert_eq!(shard.wallet_balance(0), 100);
        assert_eq!(shard.wallet_balance(1), 100);
    }

    /// One VALID on top of the proposer's own signature is not enough;
    /// a second one finalizes. (Threshold at three peers: proposer plus
    /// a strict majority of the other two.)
    #[test]
    fn test_threshold_boundary() {
        let mut shard = TestShard::new(3, 2);
        let mint = shard.mint(&[0, 1], 10);

        // Hand-deliver so the round pauses between validations.
        let announcement = TestShard::announcement(&[&mint]);
        let keys = std::sync::Arc::clone(&shard.keys);
        let outbox = RecordingBus::new();

        // Only the leader hears the announcement and proposes.
        {
            let leader = &mut shard.nodes[0];
            devv_consensus::handle_transaction_announcement(
                &announcement,
                &leader.ctx,
                &keys,
                &leader.chain,
                &mut leader.pool,
                &outbox,
            )
            .unwrap();
        }
        let proposal = outbox.take().pop().expect("leader proposed");

        // Both followers validate.
        let mut valids = Vec::new();
        for node in shard.nodes.iter_mut().skip(1) {
            devv_consensus::handle_proposal_block(&proposal, &node.ctx, &keys, &node.chain, &outbox)
                .unwrap();
            valids.push(outbox.take().pop().expect("follower validated"));
        }

        // First VALID: no final block yet.
        let leader = &mut shard.nodes[0];
        let emitted = handle_validation(
            &valids[0],
            &leader.ctx,
            &keys,
            &mut leader.chain,
            &mut leader.pool,
            &outbox,
        )
        .unwrap();
        assert!(!emitted);
        assert_eq!(leader.chain.len(), 0);
        assert!(outbox.is_empty());

        // Second VALID crosses the threshold.
        let emitted = handle_validation(
            &valids[1],
            &leader.ctx,
            &keys,
            &mut leader.chain,
            &mut leader.pool,
            &outbox,
        )
        .unwrap();
        assert!(emitted);
        assert_eq!(leader.chain.len(), 1);
        let final_block = outbox.take().pop().unwrap();
        assert_eq!(final_block.message_type, MessageType::FinalBlock);
    }

    /// A proposal outstanding when a peer's final block lands at the same
    /// height is re-anchored; its untaken transactions survive into the
    /// next round and the shard never diverges.
    #[test]
    fn test_peer_finalization_race() {
        let mut shard = TestShard::new(3, 4);
        let mint = shard.mint(&[0, 1, 2, 3], 10);
        shard.run_round(&[&mint]);
        assert_eq!(shard.agreed_height(), 1);

        // Node 1 (leader at height 1) builds a proposal holding A and B.
        let tx_a = shard.exchange(0, 1, 4);
        let tx_b = shard.exchange(2, 3, 2);
        let keys = std::sync::Arc::clone(&shard.keys);
        {
            let node1 = &mut shard.nodes[1];
            let mut payload = tx_a.canonical();
            payload.extend_from_slice(&tx_b.canonical());
            node1.pool.add_transactions(&payload, &keys).unwrap();
            node1
                .pool
                .propose_block(
                    node1.chain.expected_prev_hash(),
                    node1.chain.highest_chain_state(),
                    &keys,
                    &node1.ctx,
                )
                .unwrap();
            assert!(node1.pool.has_proposal());
        }

        // Meanwhile node 2 finalizes a competing block holding only A.
        let competing_bytes = {
            let node2 = &mut shard.nodes[2];
            node2.pool.add_transactions(&tx_a.canonical(), &keys).unwrap();
            node2
                .pool
                .propose_block(
                    node2.chain.expected_prev_hash(),
                    node2.chain.highest_chain_state(),
                    &keys,
                    &node2.ctx,
                )
                .unwrap();
            let proposal_bytes = node2.pool.proposal_canonical().unwrap();
            let proposal = devv_chain::ProposedBlock::from_bytes(
                &proposal_bytes,
                node2.chain.highest_chain_state(),
                &*keys,
                devv_primitives::AppMode::Tier2,
            )
            .unwrap();
            for voter in [0usize, 1] {
                let mut valid = Vec::new();
                valid.extend_from_slice(proposal.prev_hash());
                let addr = keys.node_address(voter).unwrap();
                valid.extend_from_slice(addr.canonical());
                let raw = keys
                    .node_key(voter)
                    .unwrap()
                    .sign_digest(&proposal.summary().digest())
                    .unwrap();
                valid.extend_from_slice(
                    devv_primitives::Signature::from_raw(&raw).unwrap().canonical(),
                );
                node2
                    .pool
                    .check_validation(&valid, &node2.ctx, &keys)
                    .unwrap();
            }
            let block = node2.pool.finalize_local_block().unwrap();
            let bytes = block.canonical();
            node2.chain.push_back(block).unwrap();
            bytes
        };

        // The competing final block reaches node 1 before any votes.
        let final_message = Message::new("shard-0", MessageType::FinalBlock, competing_bytes, 9);
        let outbox = RecordingBus::new();
        {
            let node1 = &mut shard.nodes[1];
            handle_final_block(
                &final_message,
                &node1.ctx,
                &keys,
                &mut node1.chain,
                &mut node1.pool,
                &outbox,
            )
            .unwrap();
            assert_eq!(node1.chain.len(), 2);
            // A was subsumed; the re-anchored proposal still carries B
            // and waits for node 1's next leader turn.
            assert!(node1.pool.has_proposal());
        }
        assert!(outbox.is_empty());

        // Everyone else applies the competing block; no divergence.
        shard.pump(vec![final_message]);
        assert_eq!(shard.agreed_height(), 2);

        // Two filler rounds pass the leadership around; when it returns
        // to node 1 at height 4, the carried proposal finalizes B.
        let filler_a = shard.exchange(1, 0, 1);
        shard.run_round(&[&filler_a]);
        let filler_b = shard.exchange(0, 1, 1);
        shard.run_round(&[&filler_b]);

        assert_eq!(shard.agreed_height(), 5);
        assert_eq!(shard.wallet_balance(0), 6);
        assert_eq!(shard.wallet_balance(1), 14);
        assert_eq!(shard.wallet_balance(2), 8);
        assert_eq!(shard.wallet_balance(3), 12);
        for node in &shard.nodes {
            assert_eq!(node.chain.tx_height(tx_b.signature()), Some(4));
        }
    }

    /// Replaying a final block leaves every node's state untouched.
    #[test]
    fn test_final_block_replay_is_idempotent() {
        let mut shard = TestShard::new(3, 2);
        let mint = shard.mint(&[0, 1], 10);

        // Capture the final block by running the round by hand up to it.
        let announcement = TestShard::announcement(&[&mint]);
        shard.pump(vec![announcement]);
        assert_eq!(shard.agreed_height(), 1);

        let replay = Message::new(
            "shard-0",
            MessageType::FinalBlock,
            shard.nodes[0].chain.at(0).unwrap().canonical(),
            77,
        );
        let tail_before = shard.nodes[0].chain.expected_prev_hash();

        shard.pump(vec![replay.clone()]);
        shard.pump(vec![replay]);

        assert_eq!(shard.agreed_height(), 1);
        assert_eq!(shard.nodes[0].chain.expected_prev_hash(), tail_before);
        assert_eq!(shard.wallet_balance(0), 10);
    }

    /// The canonical encoding of every finalized block reparses to the
    /// identical bytes.
    #[test]
    fn test_finalized_blocks_roundtrip() {
        let mut shard = TestShard::new(3, 2);
        let mint = shard.mint(&[0, 1], 10);
        shard.run_round(&[&mint]);
        let payment = shard.exchange(0, 1, 1);
        shard.run_round(&[&payment]);

        let dump = shard.nodes[0].chain.binary_dump();
        let mut buffer = InputBuffer::new(&dump);
        let mut prior = devv_chain::ChainState::new();
        let mut reparsed = 0;
        while buffer.has_remaining() {
            let block = devv_chain::FinalBlock::from_buffer(
                &mut buffer,
                &prior,
                devv_primitives::AppMode::Tier2,
            )
            .unwrap();
            prior = block.chain_state().clone();
            reparsed += 1;
        }
        assert_eq!(reparsed, 2);
        assert_eq!(
            prior.amount(0, shard.keys.wallet_address(1).unwrap()),
            11
        );
    }
}
