//! Dual-curve ECDSA keypairs.
//!
//! Wallet keys live on secp256k1, node keys on secp384r1. Signatures are
//! DER-encoded and zero-padded to a fixed width per curve so signed
//! structures keep a predictable byte size; the DER length octet recovers
//! the real signature for verification.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rand::rngs::OsRng;

use crate::errors::{CryptoError, CryptoResult};
use crate::hashing::Hash;

/// Padded wire width of a wallet (secp256k1) DER signature.
pub const WALLET_SIG_SIZE: usize = 72;

/// Padded wire width of a node (secp384r1) DER signature.
pub const NODE_SIG_SIZE: usize = 103;

/// Compressed SEC1 size of a wallet public key.
pub const WALLET_PUBKEY_SIZE: usize = 33;

/// Compressed SEC1 size of a node public key.
pub const NODE_PUBKEY_SIZE: usize = 49;

/// Which curve a key or signature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// secp256k1, used by wallets.
    Wallet,
    /// secp384r1, used by validator nodes.
    Node,
}

impl CurveKind {
    /// The padded DER signature width for this curve.
    pub fn signature_size(self) -> usize {
        match self {
            CurveKind::Wallet => WALLET_SIG_SIZE,
            CurveKind::Node => NODE_SIG_SIZE,
        }
    }

    /// The compressed public key size for this curve.
    pub fn pubkey_size(self) -> usize {
        match self {
            CurveKind::Wallet => WALLET_PUBKEY_SIZE,
            CurveKind::Node => NODE_PUBKEY_SIZE,
        }
    }
}

/// An ECDSA signing key on one of the two protocol curves.
#[derive(Clone)]
pub enum KeyPair {
    Wallet(k256::ecdsa::SigningKey),
    Node(p384::ecdsa::SigningKey),
}

impl KeyPair {
    /// Generate a random wallet (secp256k1) keypair.
    pub fn generate_wallet() -> Self {
        KeyPair::Wallet(k256::ecdsa::SigningKey::random(&mut OsRng))
    }

    /// Generate a random node (secp384r1) keypair.
    pub fn generate_node() -> Self {
        KeyPair::Node(p384::ecdsa::SigningKey::random(&mut OsRng))
    }

    /// Reconstruct a wallet keypair from raw scalar bytes.
    pub fn wallet_from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        k256::ecdsa::SigningKey::from_slice(bytes)
            .map(KeyPair::Wallet)
            .map_err(|_| CryptoError::InvalidPrivateKey)
    }

    /// Reconstruct a node keypair from raw scalar bytes.
    pub fn node_from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        p384::ecdsa::SigningKey::from_slice(bytes)
            .map(KeyPair::Node)
            .map_err(|_| CryptoError::InvalidPrivateKey)
    }

    /// The curve this keypair lives on.
    pub fn curve(&self) -> CurveKind {
        match self {
            KeyPair::Wallet(_) => CurveKind::Wallet,
            KeyPair::Node(_) => CurveKind::Node,
        }
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Wallet(sk) => PublicKey::Wallet(*sk.verifying_key()),
            KeyPair::Node(sk) => PublicKey::Node(*sk.verifying_key()),
        }
    }

    /// Sign a precomputed SHA-256 digest.
    ///
    /// Returns the DER signature zero-padded to the curve's fixed wire
    /// width (72 or 103 bytes).
    pub fn sign_digest(&self, digest: &Hash) -> CryptoResult<Vec<u8>> {
        match self {
            KeyPair::Wallet(sk) => {
                let sig: k256::ecdsa::Signature = sk
                    .sign_prehash(digest)
                    .map_err(|_| CryptoError::InvalidPrivateKey)?;
                // A secp256k1 DER signature is at most 72 bytes.
                Ok(pad_der(sig.to_der().as_bytes(), WALLET_SIG_SIZE))
            }
            KeyPair::Node(sk) => {
                let sig: p384::ecdsa::Signature = sk
                    .sign_prehash(digest)
                    .map_err(|_| CryptoError::InvalidPrivateKey)?;
                // Low-S normalization keeps the s scalar below the high
                // bit, so the DER encoding never exceeds the 103-byte
                // wire width.
                let sig = sig.normalize_s().unwrap_or(sig);
                Ok(pad_der(sig.to_der().as_bytes(), NODE_SIG_SIZE))
            }
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secret material.
        write!(f, "KeyPair({:?})", self.curve())
    }
}

/// An ECDSA verifying key on one of the two protocol curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKey {
    Wallet(k256::ecdsa::VerifyingKey),
    Node(p384::ecdsa::VerifyingKey),
}

impl PublicKey {
    /// Parse a compressed SEC1 public key; the length selects the curve.
    pub fn from_sec1_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        match bytes.len() {
            WALLET_PUBKEY_SIZE => k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(PublicKey::Wallet)
                .map_err(|_| CryptoError::InvalidPublicKey),
            NODE_PUBKEY_SIZE => p384::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(PublicKey::Node)
                .map_err(|_| CryptoError::InvalidPublicKey),
            _ => Err(CryptoError::InvalidPublicKey),
        }
    }

    /// The curve this key lives on.
    pub fn curve(&self) -> CurveKind {
        match self {
            PublicKey::Wallet(_) => CurveKind::Wallet,
            PublicKey::Node(_) => CurveKind::Node,
        }
    }

    /// Compressed SEC1 encoding (33 or 49 bytes).
    pub fn compressed(&self) -> Vec<u8> {
        match self {
            PublicKey::Wallet(vk) => vk.to_encoded_point(true).as_bytes().to_vec(),
            PublicKey::Node(vk) => vk.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    /// Verify a padded DER signature over a precomputed SHA-256 digest.
    pub fn verify_digest(&self, digest: &Hash, padded_der: &[u8]) -> CryptoResult<()> {
        let der = trim_der(padded_der)?;
        match self {
            PublicKey::Wallet(vk) => {
                let sig = k256::ecdsa::Signature::from_der(der)
                    .map_err(|_| CryptoError::InvalidSignature)?;
                vk.verify_prehash(digest, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            PublicKey::Node(vk) => {
                let sig = p384::ecdsa::Signature::from_der(der)
                    .map_err(|_| CryptoError::InvalidSignature)?;
                vk.verify_prehash(digest, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
        }
    }
}

/// Zero-pad a DER signature to the fixed wire width.
fn pad_der(der: &[u8], width: usize) -> Vec<u8> {
    debug_assert!(der.len() <= width);
    let mut out = vec![0u8; width];
    out[..der.len()].copy_from_slice(der);
    out
}

/// Strip the zero padding from a fixed-width DER signature.
///
/// The second DER octet is the SEQUENCE body length; both protocol curves
/// stay under the 128-byte long-form boundary.
pub fn trim_der(padded: &[u8]) -> CryptoResult<&[u8]> {
    if padded.len() < 2 || padded[0] != 0x30 {
        return Err(CryptoError::InvalidSignature);
    }
    let der_len = padded[1] as usize + 2;
    if der_len > padded.len() {
        return Err(CryptoError::InvalidSignature);
    }
    Ok(&padded[..der_len])
}
