//! Error types for key management.

use thiserror::Error;

/// Errors raised while loading or querying the key directory.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Key file could not be read.
    #[error("Key file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key file text did not follow the `<hex address>\n<PEM>` record form.
    #[error("Malformed key file near line {line}")]
    MalformedKeyFile { line: usize },

    /// PEM decode or decrypt failure.
    #[error(transparent)]
    Crypto(#[from] devv_crypto::CryptoError),

    /// Address bytes were invalid.
    #[error(transparent)]
    Protocol(#[from] devv_primitives::ProtocolError),

    /// The key derived from a PEM blob does not match its listed address.
    #[error("Key does not match address {address}")]
    AddressMismatch { address: String },

    /// No key is known for the address.
    #[error("Key for address {address} is missing")]
    KeyMissing { address: String },

    /// Node or wallet index out of range.
    #[error("Index {index} out of range ({count} known)")]
    BadIndex { index: usize, count: usize },
}

/// Result type for key operations.
pub type KeyResult<T> = Result<T, KeyError>;
