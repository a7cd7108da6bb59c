//! # Devv Concurrency
//!
//! The worker topology runs on parallel OS threads, not cooperative
//! tasks: each worker type owns one bounded multi-producer/multi-consumer
//! queue and a fixed number of threads draining it. Producers push with a
//! brief spin when the queue is full; consumers wait with a short timeout
//! so they can observe the shared shutdown flag.

pub mod queue;
pub mod worker_pool;

pub use queue::MpmcQueue;
pub use worker_pool::{WorkerPool, DEFAULT_WORKERS};
