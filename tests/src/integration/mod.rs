//! Cross-crate consensus scenarios.

pub mod consensus_rounds;
pub mod rejections;
pub mod shard_runtime;
