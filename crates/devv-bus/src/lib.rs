//! # Devv Bus
//!
//! The boundary between the validator core and the wire transport. The
//! transport itself is an external collaborator; this crate owns the frame
//! codec it speaks ([`Message`]), shard addressing and consensus constants
//! ([`ShardContext`]), and the [`MessagePublisher`] port the core emits
//! through. A topic-routed [`LoopbackBus`] implements the port in-process
//! for tests and single-machine demo runs.

pub mod context;
pub mod errors;
pub mod message;
pub mod publisher;

pub use context::{
    ShardContext, DEFAULT_BATCH_SIZE, DEFAULT_PEER_COUNT, PROPOSAL_TIMEOUT_MS, REMOTE_URI_PREFIX,
    SHARD_URI_PREFIX, VALIDATION_PERCENT,
};
pub use errors::{BusError, BusResult};
pub use message::{log_message_summary, Message, MessageType, MESSAGE_HEADER};
pub use publisher::{LoopbackBus, MessagePublisher, RecordingBus};
