//! # Devv Pool
//!
//! The pending-transaction buffer and the per-height consensus pipeline
//! of one validator: ingest announced transactions, build a proposal on
//! the leader turn, collect validation signatures up to the threshold,
//! and finalize blocks locally or from a peer.
//!
//! One pool instance exists per process, guarded by a single mutex at the
//! worker layer; every operation here takes `&mut self`.

pub mod errors;
pub mod pool;
pub mod stats;

pub use errors::{PoolError, PoolResult};
pub use pool::TransactionPool;
pub use stats::PoolStats;
