//! Rejection counters and recovery paths.

#[cfg(test)]
mod tests {
    use crate::common::TestShard;
    use devv_primitives::{Operation, Tier2Transaction, Transfer};

    /// A zero-sum violation is dropped everywhere with no state change.
    #[test]
    fn test_asymmetric_transaction_rejected() {
        let mut shard = TestShard::new(3, 2);
        let mint = shard.mint(&[0, 1], 10);
        shard.run_round(&[&mint]);

        let bad = Tier2Transaction::new(
            Operation::Exchange,
            vec![
                Transfer::new(shard.keys.wallet_address(0).unwrap().clone(), 0, -5, 0),
                Transfer::new(shard.keys.wallet_address(1).unwrap().clone(), 0, 4, 0),
            ],
            shard.nonce(),
            shard.keys.wallet_key(0).unwrap(),
        )
        .unwrap();
        shard.run_round(&[&bad]);

        assert_eq!(shard.agreed_height(), 1);
        for node in 0..3 {
            assert_eq!(shard.stats(node).rejected_asymmetric, 1);
        }
        assert_eq!(shard.wallet_balance(0), 10);
        assert_eq!(shard.wallet_balance(1), 10);
    }

    /// A Create signed by anyone but the INN is dropped.
    #[test]
    fn test_non_inn_create_rejected() {
        let mut shard = TestShard::new(3, 2);

        // A validator node key, not the INN, signs a mint.
        let bad = Tier2Transaction::new(
            Operation::Create,
            vec![
                Transfer::new(shard.keys.node_address(0).unwrap().clone(), 0, -10, 0),
                Transfer::new(shard.keys.wallet_address(0).unwrap().clone(), 0, 10, 0),
            ],
            shard.nonce(),
            shard.keys.node_key(0).unwrap(),
        )
        .unwrap();
        shard.run_round(&[&bad]);

        assert_eq!(shard.agreed_height(), 0);
        for node in 0..3 {
            assert_eq!(shard.stats(node).rejected_not_inn, 1);
        }
    }

    /// An overdrawn Exchange waits in the pool, is counted, and lands
    /// once the debtor is funded.
    #[test]
    fn test_insufficient_funds_then_recovery() {
        let mut shard = TestShard::new(3, 2);
        let seed = shard.mint(&[0, 1], 3);
        shard.run_round(&[&seed]);
        assert_eq!(shard.wallet_balance(0), 3);

        // Wallet 0 holds 3 and tries to send 5: the round goes nowhere.
        let overdrawn = shard.exchange(0, 1, 5);
        shard.run_round(&[&overdrawn]);
        assert_eq!(shard.agreed_height(), 1);
        // The leader for height 1 tried to fold it and counted the miss.
        assert_eq!(shard.stats(1).rejected_insufficient, 1);
        assert!(shard.nodes[1].pool.has_pending());

        // Funding arrives; the next round takes the mint and then the
        // waiting Exchange becomes valid and finalizes.
        let funding = shard.mint(&[0], 10);
        shard.run_round(&[&funding]);

        assert!(shard.agreed_height() >= 2);
        // Pump an empty wake-up so any remaining turn completes.
        let nudge = shard.exchange(1, 0, 1);
        shard.run_round(&[&nudge]);

        assert!(
            shard.nodes[0].chain.tx_height(overdrawn.signature()).is_some(),
            "funded transaction eventually finalized"
        );
        assert_eq!(shard.wallet_balance(0), 3 + 10 - 5 + 1);
        assert_eq!(shard.wallet_balance(1), 3 + 5 - 1);
    }

    /// A forged signature batch drops only the forged transaction.
    #[test]
    fn test_bad_signature_dropped_per_transaction() {
        let mut shard = TestShard::new(3, 2);
        let good = shard.mint(&[0, 1], 10);

        // Re-sign a mint with the wrong key to break the signature.
        let forged = Tier2Transaction::with_signature(
            Operation::Exchange,
            vec![
                Transfer::new(shard.keys.wallet_address(0).unwrap().clone(), 0, -1, 0),
                Transfer::new(shard.keys.wallet_address(1).unwrap().clone(), 0, 1, 0),
            ],
            Tier2Transaction::nonce_bytes(999),
            shard.exchange(1, 0, 1).signature().clone(),
        )
        .unwrap();

        shard.run_round(&[&good, &forged]);

        assert_eq!(shard.agreed_height(), 1);
        for node in 0..3 {
            assert_eq!(shard.stats(node).rejected_signature, 1);
            assert_eq!(shard.stats(node).accepted, 1);
        }
        assert_eq!(shard.wallet_balance(0), 10);
    }

    /// Announcing the same transaction twice pools it once.
    #[test]
    fn test_duplicate_announcement_collapses() {
        let mut shard = TestShard::new(3, 2);
        let mint = shard.mint(&[0, 1], 10);
        shard.run_round(&[&mint, &mint]);

        assert_eq!(shard.agreed_height(), 1);
        assert_eq!(shard.wallet_balance(0), 10);
        for node in 0..3 {
            assert_eq!(shard.stats(node).duplicate, 1);
        }
    }
}
