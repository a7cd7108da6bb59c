//! The address → key directory.

use std::collections::BTreeMap;

use devv_crypto::{KeyPair, PublicKey};
use devv_primitives::{Address, KeySource};
use tracing::info;

use crate::errors::{KeyError, KeyResult};
use crate::keyfile::parse_key_file;

/// The shard's key directory.
///
/// Holds every keypair this process may sign with or verify against, split
/// into three roles: the INN (coin-issuing) addresses, the shard's
/// validator nodes in peer order, and the wallets this deployment serves.
/// Read-only after construction.
pub struct KeyRing {
    keys: BTreeMap<Address, KeyPair>,
    inn_addresses: Vec<Address>,
    node_addresses: Vec<Address>,
    wallet_addresses: Vec<Address>,
    shard_count: usize,
}

impl KeyRing {
    /// Build a ring from the contents of the three key files.
    pub fn from_key_files(
        inn_file: &str,
        node_file: &str,
        wallet_file: &str,
        password: &str,
        shard_count: usize,
    ) -> KeyResult<Self> {
        let mut ring = Self::empty(shard_count);
        for entry in parse_key_file(inn_file, password)? {
            ring.inn_addresses.push(entry.address.clone());
            ring.keys.insert(entry.address, entry.key);
        }
        for entry in parse_key_file(node_file, password)? {
            ring.node_addresses.push(entry.address.clone());
            ring.keys.insert(entry.address, entry.key);
        }
        for entry in parse_key_file(wallet_file, password)? {
            ring.wallet_addresses.push(entry.address.clone());
            ring.keys.insert(entry.address, entry.key);
        }
        info!(
            inn = ring.inn_addresses.len(),
            nodes = ring.node_addresses.len(),
            wallets = ring.wallet_addresses.len(),
            "key ring loaded"
        );
        Ok(ring)
    }

    /// Load a ring from key file paths on disk.
    pub fn load(
        inn_path: &std::path::Path,
        node_path: &std::path::Path,
        wallet_path: &std::path::Path,
        password: &str,
        shard_count: usize,
    ) -> KeyResult<Self> {
        let inn = zeroize::Zeroizing::new(std::fs::read_to_string(inn_path)?);
        let nodes = zeroize::Zeroizing::new(std::fs::read_to_string(node_path)?);
        let wallets = zeroize::Zeroizing::new(std::fs::read_to_string(wallet_path)?);
        Self::from_key_files(&inn, &nodes, &wallets, password, shard_count)
    }

    /// Generate a fresh ring with one INN key, `node_count` node keys, and
    /// `wallet_count` wallet keys. Used by tests and demo runs.
    pub fn generate(node_count: usize, wallet_count: usize, shard_count: usize) -> Self {
        let mut ring = Self::empty(shard_count);

        let inn_key = KeyPair::generate_node();
        let inn_addr = Self::address_of(&inn_key);
        ring.inn_addresses.push(inn_addr.clone());
        ring.keys.insert(inn_addr, inn_key);

        for _ in 0..node_count {
            let key = KeyPair::generate_node();
            let addr = Self::address_of(&key);
            ring.node_addresses.push(addr.clone());
            ring.keys.insert(addr, key);
        }
        for _ in 0..wallet_count {
            let key = KeyPair::generate_wallet();
            let addr = Self::address_of(&key);
            ring.wallet_addresses.push(addr.clone());
            ring.keys.insert(addr, key);
        }
        ring
    }

    fn empty(shard_count: usize) -> Self {
        Self {
            keys: BTreeMap::new(),
            inn_addresses: Vec::new(),
            node_addresses: Vec::new(),
            wallet_addresses: Vec::new(),
            shard_count: shard_count.max(1),
        }
    }

    fn address_of(key: &KeyPair) -> Address {
        Address::from_raw(&key.public_key().compressed())
            .expect("compressed public key is a valid address")
    }

    /// Look up the keypair for any known address.
    pub fn get_key(&self, addr: &Address) -> KeyResult<&KeyPair> {
        self.keys.get(addr).ok_or_else(|| KeyError::KeyMissing {
            address: addr.to_hex(),
        })
    }

    /// The primary INN address.
    pub fn inn_address(&self) -> &Address {
        &self.inn_addresses[0]
    }

    /// The primary INN keypair.
    pub fn inn_key(&self) -> &KeyPair {
        &self.keys[&self.inn_addresses[0]]
    }

    /// The validator node address at `index` in peer order.
    pub fn node_address(&self, index: usize) -> KeyResult<&Address> {
        self.node_addresses.get(index).ok_or(KeyError::BadIndex {
            index,
            count: self.node_addresses.len(),
        })
    }

    /// The validator node keypair at `index` in peer order.
    pub fn node_key(&self, index: usize) -> KeyResult<&KeyPair> {
        let addr = self.node_address(index)?;
        Ok(&self.keys[addr])
    }

    /// The wallet address at `index`.
    pub fn wallet_address(&self, index: usize) -> KeyResult<&Address> {
        self.wallet_addresses.get(index).ok_or(KeyError::BadIndex {
            index,
            count: self.wallet_addresses.len(),
        })
    }

    /// The wallet keypair at `index`.
    pub fn wallet_key(&self, index: usize) -> KeyResult<&KeyPair> {
        let addr = self.wallet_address(index)?;
        Ok(&self.keys[addr])
    }

    /// The peer index of a node address, if it is one of this shard's
    /// validators.
    pub fn node_index(&self, addr: &Address) -> Option<usize> {
        self.node_addresses.iter().position(|a| a == addr)
    }

    /// Number of known validator nodes.
    pub fn node_count(&self) -> usize {
        self.node_addresses.len()
    }

    /// Number of known wallets.
    pub fn wallet_count(&self) -> usize {
        self.wallet_addresses.len()
    }

    /// The wallets whose cross-shard state this shard projects: wallet
    /// index taken modulo the shard count.
    pub fn designated_wallets(&self, shard_index: usize) -> Vec<Address> {
        self.wallet_addresses
            .iter()
            .enumerate()
            .filter(|(i, _)| i % self.shard_count == shard_index % self.shard_count)
            .map(|(_, addr)| addr.clone())
            .collect()
    }
}

impl KeySource for KeyRing {
    fn public_key(&self, addr: &Address) -> Option<PublicKey> {
        self.keys.get(addr).map(KeyPair::public_key)
    }

    fn is_inn(&self, addr: &Address) -> bool {
        self.inn_addresses.contains(addr)
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("inn", &self.inn_addresses.len())
            .field("nodes", &self.node_addresses.len())
            .field("wallets", &self.wallet_addresses.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyfile::write_key_file;

    #[test]
    fn test_generate_roles() {
        let ring = KeyRing::generate(3, 4, 1);
        assert_eq!(ring.node_count(), 3);
        assert_eq!(ring.wallet_count(), 4);
        assert!(ring.is_inn(&ring.inn_address().clone()));
        assert!(ring.inn_address().is_node());
        assert!(ring.node_address(0).unwrap().is_node());
        assert!(ring.wallet_address(0).unwrap().is_wallet());
    }

    #[test]
    fn test_node_index_lookup() {
        let ring = KeyRing::generate(3, 0, 1);
        let addr = ring.node_address(2).unwrap().clone();
        assert_eq!(ring.node_index(&addr), Some(2));
        assert_eq!(ring.node_index(ring.inn_address()), None);
    }

    #[test]
    fn test_key_missing() {
        let ring = KeyRing::generate(1, 0, 1);
        let stranger = KeyRing::generate(1, 0, 1);
        let unknown = stranger.node_address(0).unwrap();
        assert!(matches!(
            ring.get_key(unknown),
            Err(KeyError::KeyMissing { .. })
        ));
    }

    #[test]
    fn test_bad_index() {
        let ring = KeyRing::generate(2, 0, 1);
        assert!(matches!(
            ring.node_key(5),
            Err(KeyError::BadIndex { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_designated_wallets_partition() {
        let ring = KeyRing::generate(1, 6, 3);
        let mut seen = Vec::new();
        for shard in 0..3 {
            let wallets = ring.designated_wallets(shard);
            assert_eq!(wallets.len(), 2);
            seen.extend(wallets);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_from_key_files_roundtrip() {
        let source = KeyRing::generate(2, 2, 1);

        let inn = write_key_file(&[source.inn_key().clone()], "pw").unwrap();
        let nodes = write_key_file(
            &[
                source.node_key(0).unwrap().clone(),
                source.node_key(1).unwrap().clone(),
            ],
            "pw",
        )
        .unwrap();
        let wallets = write_key_file(
            &[
                source.wallet_key(0).unwrap().clone(),
                source.wallet_key(1).unwrap().clone(),
            ],
            "pw",
        )
        .unwrap();

        let ring = KeyRing::from_key_files(&inn, &nodes, &wallets, "pw", 1).unwrap();
        assert_eq!(ring.node_address(1).unwrap(), source.node_address(1).unwrap());
        assert_eq!(
            ring.wallet_address(0).unwrap(),
            source.wallet_address(0).unwrap()
        );
        assert!(ring.is_inn(source.inn_address()));
    }
}
