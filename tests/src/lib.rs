//! # Devv Test Suite
//!
//! Unified test crate containing:
//!
//! ```text
//! tests/src/
//! ├── common.rs         # Deterministic in-process shard harness
//! └── integration/      # Cross-crate consensus scenarios
//!     ├── consensus_rounds.rs   # Full rounds, races, idempotence
//!     ├── rejections.rs         # Rejection counters and recovery
//!     └── shard_runtime.rs      # Threaded worker-pool runs
//! ```
//!
//! Run with `cargo test -p devv-tests`.

pub mod common;
pub mod integration;
