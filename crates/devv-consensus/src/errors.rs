//! Error types for consensus handlers.

use thiserror::Error;

/// Errors raised while handling a consensus message.
///
/// Handler errors are logged and dropped by the worker that called them;
/// a failing message never takes the process down.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Protocol(#[from] devv_primitives::ProtocolError),

    #[error(transparent)]
    Chain(#[from] devv_chain::ChainError),

    #[error(transparent)]
    Pool(#[from] devv_pool::PoolError),

    #[error(transparent)]
    Keys(#[from] devv_keys::KeyError),

    /// Payload too small for its message type.
    #[error("{message_type} payload too small: {size} bytes")]
    PayloadTooSmall {
        message_type: &'static str,
        size: usize,
    },
}

/// Result type for consensus handlers.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
