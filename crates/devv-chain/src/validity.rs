//! Transaction validity against a chain state.
//!
//! Validity assumes soundness was already established (the pool checks it
//! on ingest, block parsing on decode). The folds here add the stateful
//! half: Exchange debits must be covered by the debited balance, and when
//! many transactions fold into one proposal the committed-debit aggregate
//! keeps acceptance independent of fold order.
//!
//! A rejected transaction leaves state, summary, and aggregate untouched:
//! debits are checked before anything is applied.

use std::collections::BTreeMap;

use devv_primitives::{Address, Operation, Summary, Tier2Transaction, Transaction};

use crate::chain_state::ChainState;
use crate::errors::{ChainError, ChainResult};

/// Committed debits per `(address, coin)` across one proposal fold.
pub type AggregateMap = BTreeMap<(Address, u64), i64>;

/// Fold one transaction into a state and summary.
pub fn apply_transaction(
    tx: &Transaction,
    state: &mut ChainState,
    summary: &mut Summary,
) -> ChainResult<()> {
    match tx {
        Transaction::Tier2(t2) => apply_tier2(t2, state, summary, None),
        Transaction::Tier1(t1) => {
            for transfer in t1.summary().transfers() {
                state.add_coin(transfer.address(), transfer.coin(), transfer.amount());
                summary.add_item(
                    transfer.address(),
                    transfer.coin(),
                    transfer.amount(),
                    transfer.delay(),
                );
            }
            Ok(())
        }
    }
}

/// Fold one transaction into a proposal being built from `prior`.
///
/// On top of the running-state check, each Exchange debit must satisfy
/// `prior + committed + amount >= 0`, where `committed` is the sum of
/// debits already accepted for that `(address, coin)`. Accepted debits
/// update the aggregate, which makes the accepted set identical for every
/// fold order.
pub fn apply_in_aggregate(
    tx: &Transaction,
    state: &mut ChainState,
    summary: &mut Summary,
    aggregate: &mut AggregateMap,
    prior: &ChainState,
) -> ChainResult<()> {
    match tx {
        Transaction::Tier2(t2) => apply_tier2(t2, state, summary, Some((aggregate, prior))),
        tier1 => apply_transaction(tier1, state, summary),
    }
}

fn apply_tier2(
    tx: &Tier2Transaction,
    state: &mut ChainState,
    summary: &mut Summary,
    mut aggregate: Option<(&mut AggregateMap, &ChainState)>,
) -> ChainResult<()> {
    let exchange = tx.operation() == Operation::Exchange;

    // Check every debit before applying anything.
    if exchange {
        for transfer in tx.transfers().iter().filter(|t| t.amount() < 0) {
            let addr = transfer.address();
            let coin = transfer.coin();
            let amount = transfer.amount();

            let available = state.amount(coin, addr);
            if available + amount < 0 {
                return Err(ChainError::InsufficientFunds {
                    coin,
                    amount,
                    available,
                });
            }
            if let Some((agg, prior)) = aggregate.as_ref() {
                let historic = prior.amount(coin, addr);
                let committed = agg.get(&(addr.clone(), coin)).copied().unwrap_or(0);
                if historic + committed + amount < 0 {
                    return Err(ChainError::InsufficientFunds {
                        coin,
                        amount,
                        available: historic + committed,
                    });
                }
            }
        }
    }

    for transfer in tx.transfers() {
        state.add_coin(transfer.address(), transfer.coin(), transfer.amount());
        summary.add_item(
            transfer.address(),
            transfer.coin(),
            transfer.amount(),
            transfer.delay(),
        );
        if transfer.amount() < 0 {
            if let Some((agg, _)) = aggregate.as_mut() {
                *agg.entry((transfer.address().clone(), transfer.coin()))
                    .or_default() += transfer.amount();
            }
        }
    }
    Ok(())
}
