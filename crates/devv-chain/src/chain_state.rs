//! The per-address per-coin balance ledger.

use std::collections::BTreeMap;

use devv_primitives::{Address, Summary};

/// Balances by address and coin, plus credits waiting out their delay.
///
/// Balances that return to zero are kept as explicit zeros so the key set
/// only ever grows; proposal snapshots rely on that monotonicity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainState {
    balances: BTreeMap<Address, BTreeMap<u64, i64>>,
    /// Pending delayed credits keyed by `(address, coin, maturity_ms)`.
    pending: BTreeMap<(Address, u64, u64), i64>,
}

impl ChainState {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a delta to one balance, creating the entry on first touch.
    ///
    /// No lower-bound check happens here; validity rules are enforced by
    /// the callers that fold transactions.
    pub fn add_coin(&mut self, addr: &Address, coin: u64, delta: i64) {
        *self
            .balances
            .entry(addr.clone())
            .or_default()
            .entry(coin)
            .or_default() += delta;
    }

    /// The current balance of one coin at one address.
    pub fn amount(&self, coin: u64, addr: &Address) -> i64 {
        self.balances
            .get(addr)
            .and_then(|coins| coins.get(&coin))
            .copied()
            .unwrap_or(0)
    }

    /// Fold a block summary into the ledger.
    ///
    /// Immediate amounts apply directly; delayed deltas become pending
    /// credits maturing `delay` seconds after the block time.
    pub fn apply_summary(&mut self, summary: &Summary, block_time_ms: u64) {
        for (addr, item) in summary.iter() {
            for (coin, amount) in item.coins() {
                self.add_coin(addr, *coin, *amount);
            }
            for (coin, delayed) in item.delayed() {
                let maturity = block_time_ms.saturating_add(delayed.delay.saturating_mul(1000));
                *self
                    .pending
                    .entry((addr.clone(), *coin, maturity))
                    .or_default() += delayed.delta;
            }
        }
    }

    /// Fold every pending credit whose maturity has passed into the
    /// balances.
    pub fn mature_pending(&mut self, now_ms: u64) {
        let matured: Vec<(Address, u64, u64)> = self
            .pending
            .keys()
            .filter(|(_, _, maturity)| *maturity <= now_ms)
            .cloned()
            .collect();
        for key in matured {
            let delta = self.pending.remove(&key).unwrap_or(0);
            self.add_coin(&key.0, key.1, delta);
        }
    }

    /// Number of addresses with ledger entries.
    pub fn address_count(&self) -> usize {
        self.balances.len()
    }

    /// Number of credits still waiting on their delay.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Iterate balances in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &BTreeMap<u64, i64>)> {
        self.balances.iter()
    }

    /// Net balance over every address for one coin.
    pub fn total_for_coin(&self, coin: u64) -> i128 {
        self.balances
            .values()
            .filter_map(|coins| coins.get(&coin))
            .map(|amount| i128::from(*amount))
            .sum()
    }
}
