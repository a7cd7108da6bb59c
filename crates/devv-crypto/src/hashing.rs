//! SHA-256 hashing.
//!
//! Every signature in the protocol covers the SHA-256 digest of the
//! relevant canonical bytes, and blocks chain on the SHA-256 of the
//! previous block's canonical form.

use sha2::{Digest, Sha256};

/// SHA-256 output size in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; HASH_SIZE];

/// Hash a byte string with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash multiple inputs as one stream.
pub fn sha256_many(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize().into()
}

/// The previous-block hash used at height 0.
pub fn genesis_hash() -> Hash {
    sha256(b"Genesis")
}
