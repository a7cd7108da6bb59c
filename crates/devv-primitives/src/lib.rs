//! # Devv Primitives
//!
//! The wire-level data model of the Devv protocol: addresses, signatures,
//! transfers, transactions, block summaries, and validation maps, together
//! with their canonical byte encoding.
//!
//! ## Canonical form
//!
//! Every type has exactly one byte encoding (little-endian integers,
//! addresses in ascending canonical order). Hashing and signing always
//! operate on canonical bytes, so two values are protocol-equal iff their
//! canonical encodings are equal.
//!
//! ## Soundness vs validity
//!
//! *Soundness* is the stateless portion of transaction checking (structure,
//! zero-sum transfers, single debit, INN privilege, signature) and lives
//! here. *Validity* additionally consults a chain state and lives with the
//! state types.

pub mod address;
pub mod buffers;
pub mod errors;
pub mod signature;
pub mod summary;
pub mod tier1;
pub mod tier2;
pub mod transaction;
pub mod transfer;
pub mod validation;

pub use address::{Address, NODE_ADDR_SIZE, WALLET_ADDR_SIZE};
pub use buffers::InputBuffer;
pub use devv_crypto::{Hash, HASH_SIZE};
pub use errors::{ProtocolError, ProtocolResult};
pub use signature::Signature;
pub use summary::{AddressSummary, DelayedItem, Summary};
pub use tier1::Tier1Transaction;
pub use tier2::{Operation, Tier2Transaction, MIN_NONCE_SIZE, TX_ENVELOPE_SIZE};
pub use transaction::Transaction;
pub use transfer::Transfer;
pub use validation::Validation;

/// Which tier of the network a process participates in.
///
/// Tier-2 shards order application transactions; the Tier-1 root chain
/// orders signed restatements of Tier-2 block summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Tier1,
    Tier2,
}

/// Read access to the shard's key directory.
///
/// Implemented by the key ring; primitives only ever need to resolve an
/// address to its public key and to test INN membership.
pub trait KeySource {
    /// Look up the public key for an address known to the directory.
    fn public_key(&self, addr: &Address) -> Option<devv_crypto::PublicKey>;

    /// Whether the address belongs to the Issuing Node Network.
    fn is_inn(&self, addr: &Address) -> bool;
}
