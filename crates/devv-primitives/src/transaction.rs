//! The transaction sum type.
//!
//! Tier-1 and Tier-2 transactions share a pool, blocks, and the signature
//! index, so they travel together as a tagged sum dispatched on the
//! variant. Which variant a byte stream parses as is decided by the
//! process's tier, not by the bytes themselves.

use crate::buffers::InputBuffer;
use crate::errors::ProtocolResult;
use crate::signature::Signature;
use crate::tier1::Tier1Transaction;
use crate::tier2::Tier2Transaction;
use crate::{AppMode, KeySource};

/// A Tier-1 or Tier-2 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Tier1(Tier1Transaction),
    Tier2(Tier2Transaction),
}

impl Transaction {
    /// Read one transaction of the tier-appropriate variant.
    pub fn from_buffer(buffer: &mut InputBuffer<'_>, mode: AppMode) -> ProtocolResult<Self> {
        match mode {
            AppMode::Tier1 => Tier1Transaction::from_buffer(buffer).map(Transaction::Tier1),
            AppMode::Tier2 => Tier2Transaction::from_buffer(buffer).map(Transaction::Tier2),
        }
    }

    /// The transaction's signature, which doubles as its pool identity.
    pub fn signature(&self) -> &Signature {
        match self {
            Transaction::Tier1(tx) => tx.signature(),
            Transaction::Tier2(tx) => tx.signature(),
        }
    }

    /// The canonical encoding.
    pub fn canonical(&self) -> Vec<u8> {
        match self {
            Transaction::Tier1(tx) => tx.canonical(),
            Transaction::Tier2(tx) => tx.canonical(),
        }
    }

    /// Total serialized size in bytes.
    pub fn byte_size(&self) -> usize {
        match self {
            Transaction::Tier1(tx) => tx.byte_size(),
            Transaction::Tier2(tx) => tx.byte_size(),
        }
    }

    /// Stateless soundness check.
    pub fn is_sound(&self, keys: &impl KeySource) -> ProtocolResult<()> {
        match self {
            Transaction::Tier1(tx) => tx.is_sound(keys),
            Transaction::Tier2(tx) => tx.is_sound(keys),
        }
    }

    /// The Tier-2 payload, if this is a Tier-2 transaction.
    pub fn as_tier2(&self) -> Option<&Tier2Transaction> {
        match self {
            Transaction::Tier2(tx) => Some(tx),
            Transaction::Tier1(_) => None,
        }
    }

    /// The Tier-1 payload, if this is a Tier-1 transaction.
    pub fn as_tier1(&self) -> Option<&Tier1Transaction> {
        match self {
            Transaction::Tier1(tx) => Some(tx),
            Transaction::Tier2(_) => None,
        }
    }
}

impl From<Tier2Transaction> for Transaction {
    fn from(tx: Tier2Transaction) -> Self {
        Transaction::Tier2(tx)
    }
}

impl From<Tier1Transaction> for Transaction {
    fn from(tx: Tier1Transaction) -> Self {
        Transaction::Tier1(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, WALLET_ADDR_SIZE};
    use crate::summary::Summary;
    use crate::tier2::tests::TestKeys;
    use crate::tier2::Operation;
    use crate::transfer::Transfer;
    use devv_crypto::KeyPair;

    #[test]
    fn test_mode_selects_variant() {
        let mut keys = TestKeys::new();
        let node_key = KeyPair::generate_node();
        let node_addr = keys.insert(&node_key);

        let a = Address::from_raw(&[1u8; WALLET_ADDR_SIZE]).unwrap();
        let b = Address::from_raw(&[2u8; WALLET_ADDR_SIZE]).unwrap();
        let mut summary = Summary::new();
        summary.add_item(&a, 0, -1, 0);
        summary.add_item(&b, 0, 1, 0);

        let t1 = crate::tier1::Tier1Transaction::create(summary, node_addr, &node_key).unwrap();
        let bytes = t1.canonical();

        let mut buffer = InputBuffer::new(&bytes);
        let parsed = Transaction::from_buffer(&mut buffer, AppMode::Tier1).unwrap();
        assert!(parsed.as_tier1().is_some());
        assert_eq!(parsed.canonical(), bytes);
    }

    #[test]
    fn test_tier2_through_sum_type() {
        let mut keys = TestKeys::new();
        let wallet_key = KeyPair::generate_wallet();
        let sender = keys.insert(&wallet_key);
        let receiver = keys.insert(&KeyPair::generate_wallet());

        let tx = crate::tier2::Tier2Transaction::new(
            Operation::Exchange,
            vec![
                Transfer::new(sender, 0, -2, 0),
                Transfer::new(receiver, 0, 2, 0),
            ],
            crate::tier2::Tier2Transaction::nonce_bytes(9),
            &wallet_key,
        )
        .unwrap();

        let wrapped: Transaction = tx.clone().into();
        assert!(wrapped.is_sound(&keys).is_ok());
        assert_eq!(wrapped.signature(), tx.signature());

        let bytes = wrapped.canonical();
        let mut buffer = InputBuffer::new(&bytes);
        let parsed = Transaction::from_buffer(&mut buffer, AppMode::Tier2).unwrap();
        assert_eq!(parsed, wrapped);
    }
}
