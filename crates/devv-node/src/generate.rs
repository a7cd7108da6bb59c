//! Demo transaction generation.
//!
//! Produces the same traffic shape the original network benchmarks used:
//! each batch opens with an INN Create minting one coin to every wallet,
//! followed by wallet-to-wallet Exchange transfers of one coin each.

use devv_bus::ShardContext;
use devv_keys::KeyRing;
use devv_primitives::{Operation, Tier2Transaction, Transfer};
use tracing::info;

/// Generate at least `count` transactions in batches of `batch_size`,
/// each batch serialized as one announcement payload.
pub fn generate_transactions(
    keys: &KeyRing,
    ctx: &ShardContext,
    count: usize,
    batch_size: usize,
) -> Vec<Vec<u8>> {
    let wallet_count = keys.wallet_count();
    let inn_addr = keys.inn_address().clone();
    // Distinct nonce space per node so parallel generators never collide.
    let mut nonce = (ctx.node_index() as u64 + 1) * 1_000_000;

    let mut batches = Vec::new();
    let mut generated = 0;
    while generated < count {
        let mut batch = Vec::new();
        let mut in_batch = 0;

        // Mint one coin to every wallet.
        let mut transfers = vec![Transfer::new(inn_addr.clone(), 0, -(wallet_count as i64), 0)];
        for i in 0..wallet_count {
            transfers.push(Transfer::new(
                keys.wallet_address(i).expect("wallet index in range").clone(),
                0,
                1,
                0,
            ));
        }
        nonce += 1;
        let mint = Tier2Transaction::new(
            Operation::Create,
            transfers,
            Tier2Transaction::nonce_bytes(nonce),
            keys.inn_key(),
        )
        .expect("generated mint is well-formed");
        batch.extend_from_slice(&mint.canonical());
        in_batch += 1;

        // Every wallet pays every other wallet one coin.
        'pairs: for i in 0..wallet_count {
            for j in 0..wallet_count {
                if i == j {
                    continue;
                }
                if in_batch >= batch_size {
                    break 'pairs;
                }
                nonce += 1;
                let payment = Tier2Transaction::new(
                    Operation::Exchange,
                    vec![
                        Transfer::new(
                            keys.wallet_address(i).expect("wallet index in range").clone(),
                            0,
                            -1,
                            0,
                        ),
                        Transfer::new(
                            keys.wallet_address(j).expect("wallet index in range").clone(),
                            0,
                            1,
                            0,
                        ),
                    ],
                    Tier2Transaction::nonce_bytes(nonce),
                    keys.wallet_key(i).expect("wallet index in range"),
                )
                .expect("generated payment is well-formed");
                batch.extend_from_slice(&payment.canonical());
                in_batch += 1;
            }
        }

        generated += in_batch;
        batches.push(batch);
    }

    info!(
        transactions = generated,
        batches = batches.len(),
        "generated demo transactions"
    );
    batches
}
