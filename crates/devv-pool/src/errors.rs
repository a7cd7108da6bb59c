//! Error types for pool operations.

use devv_chain::ChainError;
use devv_keys::KeyError;
use devv_primitives::ProtocolError;
use thiserror::Error;

/// Errors raised by pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Structural or signature failure from the primitives layer.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// State or block failure from the chain layer.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Signing-key lookup failure; fatal because the node cannot propose
    /// or validate without its own key.
    #[error(transparent)]
    Keys(#[from] KeyError),

    /// An operation needed an outstanding proposal and none exists.
    #[error("No outstanding proposal")]
    NoProposal,

    /// A peer's final block failed verification; fatal at this height.
    #[error("Invalid final block: {reason}")]
    InvalidFinalBlock { reason: String },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
