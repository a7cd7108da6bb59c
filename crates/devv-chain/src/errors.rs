//! Error types for chain-state and block processing.

use devv_primitives::ProtocolError;
use thiserror::Error;

/// Errors raised while validating transactions against state or handling
/// blocks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Structural or signature failure from the primitives layer.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An Exchange debit would drive a balance negative.
    #[error("Insufficient funds: coin {coin} debit {amount} against balance {available}")]
    InsufficientFunds {
        coin: u64,
        amount: i64,
        available: i64,
    },

    /// Unknown block version byte.
    #[error("Invalid block version: {version}")]
    BadBlockVersion { version: u8 },

    /// Serialized block size field disagrees with the payload.
    #[error("Wrong block size: header says {expected}, payload is {actual}")]
    WrongBlockSize { expected: u64, actual: u64 },

    /// Block sections were inconsistent with their size fields.
    #[error("Malformed block: {0}")]
    MalformedBlock(String),

    /// A block does not chain onto the current tail.
    #[error("Previous-hash mismatch at height {height}")]
    PrevHashMismatch { height: u64 },

    /// A final block's summary disagrees with its transactions.
    #[error("Block summary does not match its transactions")]
    SummaryMismatch,

    /// A final block carries too few validation signatures.
    #[error("Validation threshold not met: {got} of {required} signatures")]
    ThresholdNotMet { got: usize, required: usize },
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
