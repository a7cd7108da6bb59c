//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors raised by hashing, signing, and key handling.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Public key bytes did not describe a valid curve point.
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Private key bytes were not a valid scalar for the curve.
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Signature bytes could not be parsed as DER.
    #[error("Invalid signature encoding")]
    InvalidSignature,

    /// Signature parsed but did not verify against the key and digest.
    #[error("Signature verification failed")]
    VerificationFailed,

    /// Key and signature belong to different curves.
    #[error("Curve mismatch: key is {key:?}, signature is {signature:?}")]
    CurveMismatch {
        key: crate::CurveKind,
        signature: crate::CurveKind,
    },

    /// PEM or PKCS#8 structure could not be decoded.
    #[error("Key decode error: {0}")]
    KeyDecode(String),

    /// Decryption of an encrypted private key failed (wrong password or
    /// corrupt blob).
    #[error("Key decryption failed: {0}")]
    KeyDecrypt(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
