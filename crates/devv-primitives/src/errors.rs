//! Protocol-level error types.

use thiserror::Error;

/// Errors raised while decoding or checking protocol data.
///
/// Everything here is data-driven: a failing variant rejects the offending
/// input and never aborts the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A read ran past the end of the input buffer.
    #[error("Truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Byte layout was structurally invalid.
    #[error("Malformed transaction: {0}")]
    MalformedTx(String),

    /// Address bytes had an unknown length or type tag.
    #[error("Invalid address: {length} raw bytes")]
    InvalidAddress { length: usize },

    /// Signature bytes had an unknown length or type tag.
    #[error("Invalid signature: {length} raw bytes")]
    InvalidSignature { length: usize },

    /// Unknown transaction operation byte.
    #[error("Invalid operation: {value}")]
    InvalidOperation { value: u8 },

    /// Transaction nonce below the protocol minimum.
    #[error("Nonce too small: {size} bytes")]
    NonceTooSmall { size: usize },

    /// Transfer amounts did not sum to zero.
    #[error("Transaction amounts are asymmetric (sum = {sum})")]
    TxAsymmetric { sum: i128 },

    /// More than one distinct debit address in a transaction.
    #[error("Multiple senders in transaction")]
    MultipleSenders,

    /// No debit transfer present.
    #[error("Transaction has no debit transfer")]
    MissingDebit,

    /// A privileged operation was not signed by an INN address.
    #[error("Non-INN address performing privileged operation")]
    NotInnSigner,

    /// Signature did not verify (or the signer's key is unknown).
    #[error("Transaction signature did not validate")]
    BadSignature,

    /// Summary zero-sum invariant broken.
    #[error("Summary is asymmetric (total = {total})")]
    SummaryAsymmetric { total: i128 },

    /// Summary carried no entries.
    #[error("Summary is empty")]
    EmptySummary,

    /// Hex text form could not be decoded.
    #[error("Invalid hex encoding")]
    InvalidHex,
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
