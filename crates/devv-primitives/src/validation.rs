//! Validator co-signatures over a block summary.
//!
//! An address-keyed ordered map, so any permutation of the same signature
//! set encodes identically and re-adding a signature is a no-op.

use std::collections::BTreeMap;

use crate::address::Address;
use crate::buffers::{push_u32, InputBuffer};
use crate::errors::ProtocolResult;
use crate::signature::Signature;

/// The validation section of a block: node address → signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    sigs: BTreeMap<Address, Signature>,
}

impl Validation {
    /// An empty validation map.
    pub fn new() -> Self {
        Self::default()
    }

    /// A validation map holding one signature.
    pub fn with(node: Address, sig: Signature) -> Self {
        let mut v = Self::default();
        v.add(node, sig);
        v
    }

    /// Record a node's signature.
    ///
    /// Returns `true` if the node was not already present.
    pub fn add(&mut self, node: Address, sig: Signature) -> bool {
        self.sigs.insert(node, sig).is_none()
    }

    /// Merge another validation map into this one.
    pub fn merge(&mut self, other: &Validation) {
        for (node, sig) in &other.sigs {
            self.sigs.insert(node.clone(), sig.clone());
        }
    }

    /// Number of recorded signatures.
    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    /// Whether no signatures are recorded.
    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    /// The signature recorded for a node, if any.
    pub fn get(&self, node: &Address) -> Option<&Signature> {
        self.sigs.get(node)
    }

    /// The first (lowest-address) validation pair.
    pub fn first(&self) -> Option<(&Address, &Signature)> {
        self.sigs.iter().next()
    }

    /// Iterate pairs in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Signature)> {
        self.sigs.iter()
    }

    /// Serialized size in bytes.
    pub fn byte_size(&self) -> usize {
        4 + self
            .sigs
            .iter()
            .map(|(addr, sig)| addr.size() + sig.size())
            .sum::<usize>()
    }

    /// The canonical encoding: count then address/signature pairs.
    pub fn canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_size());
        push_u32(&mut out, self.sigs.len() as u32);
        for (addr, sig) in &self.sigs {
            out.extend_from_slice(addr.canonical());
            out.extend_from_slice(sig.canonical());
        }
        out
    }

    /// Read a canonical validation map of `count` pairs from a buffer.
    pub fn from_buffer(buffer: &mut InputBuffer<'_>) -> ProtocolResult<Self> {
        let count = buffer.next_u32()?;
        let mut sigs = BTreeMap::new();
        for _ in 0..count {
            let addr = Address::from_buffer(buffer)?;
            let sig = Signature::from_buffer(buffer)?;
            sigs.insert(addr, sig);
        }
        Ok(Self { sigs })
    }
}
