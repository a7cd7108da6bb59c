//! Error types for the message frame codec.

use thiserror::Error;

/// Errors raised while decoding wire frames.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// Frame truncated, header byte wrong, or a section inconsistent.
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// Message type value outside the known range.
    #[error("Unknown message type: {value}")]
    UnknownMessageType { value: u32 },
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;
