//! Aggregated coin deltas over a block.
//!
//! A summary maps each touched address to its per-coin deltas, split into
//! delayed and immediate entries. Addresses and coins iterate in ascending
//! order so the canonical encoding is deterministic regardless of the
//! order transfers were folded in.
//!
//! Invariant: summed over all addresses and coins, delayed deltas plus
//! immediate amounts equal zero.

use std::collections::BTreeMap;

use crate::address::Address;
use crate::buffers::{push_i64, push_u64, InputBuffer};
use crate::errors::{ProtocolError, ProtocolResult};
use crate::transfer::Transfer;
use devv_crypto::{sha256, Hash};

/// A delayed coin delta: the change and its delay in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayedItem {
    pub delta: i64,
    pub delay: u64,
}

/// Per-address summary entry: delayed deltas and immediate amounts by coin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSummary {
    delayed: BTreeMap<u64, DelayedItem>,
    coins: BTreeMap<u64, i64>,
}

impl AddressSummary {
    /// Delayed deltas by coin.
    pub fn delayed(&self) -> &BTreeMap<u64, DelayedItem> {
        &self.delayed
    }

    /// Immediate amounts by coin.
    pub fn coins(&self) -> &BTreeMap<u64, i64> {
        &self.coins
    }

    fn byte_size(&self) -> usize {
        16 + self.delayed.len() * 24 + self.coins.len() * 16
    }
}

/// The aggregated state change of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    items: BTreeMap<Address, AddressSummary>,
}

impl Summary {
    /// An empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one transfer-shaped delta into the summary.
    ///
    /// Duplicate `(address, coin)` entries merge by addition; zero results
    /// are retained so the address set stays stable.
    pub fn add_item(&mut self, address: &Address, coin: u64, delta: i64, delay: u64) {
        let entry = self.items.entry(address.clone()).or_default();
        if delay > 0 {
            let item = entry.delayed.entry(coin).or_default();
            item.delta += delta;
            item.delay = delay;
        } else {
            *entry.coins.entry(coin).or_default() += delta;
        }
    }

    /// Merge another summary into this one, adding matching entries.
    pub fn merge(&mut self, other: &Summary) {
        for (addr, item) in &other.items {
            for (coin, delayed) in &item.delayed {
                self.add_item(addr, *coin, delayed.delta, delayed.delay);
            }
            for (coin, amount) in &item.coins {
                self.add_item(addr, *coin, *amount, 0);
            }
        }
    }

    /// Whether no addresses are recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of addresses recorded.
    pub fn address_count(&self) -> usize {
        self.items.len()
    }

    /// Iterate entries in canonical (ascending address) order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &AddressSummary)> {
        self.items.iter()
    }

    /// Net delta over every address and coin.
    pub fn total_delta(&self) -> i128 {
        let mut total: i128 = 0;
        for item in self.items.values() {
            for delayed in item.delayed.values() {
                total += i128::from(delayed.delta);
            }
            for amount in item.coins.values() {
                total += i128::from(*amount);
            }
        }
        total
    }

    /// Sanity check: non-empty and zero-sum.
    pub fn is_sane(&self) -> bool {
        !self.items.is_empty() && self.total_delta() == 0
    }

    /// Like `is_sane`, but reporting why the check failed.
    pub fn check_sane(&self) -> ProtocolResult<()> {
        if self.items.is_empty() {
            return Err(ProtocolError::EmptySummary);
        }
        let total = self.total_delta();
        if total != 0 {
            return Err(ProtocolError::SummaryAsymmetric { total });
        }
        Ok(())
    }

    /// Serialized size in bytes.
    pub fn byte_size(&self) -> usize {
        8 + self
            .items
            .iter()
            .map(|(addr, item)| addr.size() + item.byte_size())
            .sum::<usize>()
    }

    /// The canonical encoding.
    pub fn canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_size());
        push_u64(&mut out, self.items.len() as u64);
        for (addr, item) in &self.items {
            out.extend_from_slice(addr.canonical());
            push_u64(&mut out, item.delayed.len() as u64);
            push_u64(&mut out, item.coins.len() as u64);
            for (coin, delayed) in &item.delayed {
                push_u64(&mut out, *coin);
                push_u64(&mut out, delayed.delay);
                push_i64(&mut out, delayed.delta);
            }
            for (coin, amount) in &item.coins {
                push_u64(&mut out, *coin);
                push_i64(&mut out, *amount);
            }
        }
        out
    }

    /// SHA-256 of the canonical encoding; the digest validators co-sign.
    pub fn digest(&self) -> Hash {
        sha256(&self.canonical())
    }

    /// Read a canonical summary from a buffer.
    pub fn from_buffer(buffer: &mut InputBuffer<'_>) -> ProtocolResult<Self> {
        let address_count = buffer.next_u64()?;
        let mut items = BTreeMap::new();
        for _ in 0..address_count {
            let addr = Address::from_buffer(buffer)?;
            let delay_count = buffer.next_u64()?;
            let coin_count = buffer.next_u64()?;
            let mut entry = AddressSummary::default();
            for _ in 0..delay_count {
                let coin = buffer.next_u64()?;
                let delay = buffer.next_u64()?;
                let delta = buffer.next_i64()?;
                entry.delayed.insert(coin, DelayedItem { delta, delay });
            }
            for _ in 0..coin_count {
                let coin = buffer.next_u64()?;
                let amount = buffer.next_i64()?;
                entry.coins.insert(coin, amount);
            }
            items.insert(addr, entry);
        }
        Ok(Self { items })
    }

    /// Reconstruct the transfers this summary describes, in canonical order.
    pub fn transfers(&self) -> Vec<Transfer> {
        let mut out = Vec::new();
        for (addr, item) in &self.items {
            for (coin, delayed) in &item.delayed {
                out.push(Transfer::new(addr.clone(), *coin, delayed.delta, delayed.delay));
            }
            for (coin, amount) in &item.coins {
                out.push(Transfer::new(addr.clone(), *coin, *amount, 0));
            }
        }
        out
    }

    /// Coin amounts credited to one address, counting delayed entries whose
    /// delay has elapsed.
    pub fn coins_for_address(&self, addr: &Address, elapsed_ms: u64) -> Vec<(u64, i64)> {
        let mut out = Vec::new();
        if let Some(item) = self.items.get(addr) {
            for (coin, delayed) in &item.delayed {
                if delayed.delay.saturating_mul(1000) <= elapsed_ms {
                    out.push((*coin, delayed.delta));
                }
            }
            for (coin, amount) in &item.coins {
                out.push((*coin, *amount));
            }
        }
        out
    }

    /// JSON debug representation.
    pub fn to_json(&self) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = self
            .items
            .iter()
            .map(|(addr, item)| {
                serde_json::json!({
                    "addr": addr.to_hex(),
                    "delayed": item
                        .delayed
                        .iter()
                        .map(|(coin, d)| serde_json::json!({
                            "coin": coin, "delta": d.delta, "delay": d.delay
                        }))
                        .collect::<Vec<_>>(),
                    "coins": item
                        .coins
                        .iter()
                        .map(|(coin, amount)| serde_json::json!({
                            "coin": coin, "amount": amount
                        }))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        serde_json::json!({ "summary": entries })
    }
}
