//! # Devv Crypto
//!
//! Hashing and signing primitives for the Devv validator.
//!
//! Two ECDSA curves are in play:
//!
//! - **secp256k1** for wallet keys (33-byte compressed public keys,
//!   signatures padded to 72 bytes)
//! - **secp384r1** for node keys (49-byte compressed public keys,
//!   signatures padded to 103 bytes)
//!
//! All signing is over the SHA-256 digest of canonical bytes. Signatures are
//! DER-encoded and zero-padded to their curve's fixed wire width so that
//! every signed structure has a predictable size.

pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod pem;

pub use ecdsa::{CurveKind, KeyPair, PublicKey, WALLET_SIG_SIZE, NODE_SIG_SIZE};
pub use errors::CryptoError;
pub use hashing::{genesis_hash, sha256, Hash, HASH_SIZE};
pub use pem::{decrypt_key_pem, encrypt_key_pem};
