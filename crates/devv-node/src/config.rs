//! Node configuration from the command line.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use devv_bus::{ShardContext, DEFAULT_BATCH_SIZE, DEFAULT_PEER_COUNT};
use devv_concurrency::DEFAULT_WORKERS;
use devv_primitives::AppMode;
use serde::Serialize;

/// Which tier this process validates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Mode {
    T1,
    T2,
}

impl From<Mode> for AppMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::T1 => AppMode::Tier1,
            Mode::T2 => AppMode::Tier2,
        }
    }
}

/// Command-line options for `devv-validator`.
#[derive(Debug, Parser, Serialize)]
#[command(name = "devv-validator", about = "Devv shard validator node")]
pub struct NodeConfig {
    /// Validator tier.
    #[arg(long, value_enum, default_value = "t2")]
    pub mode: Mode,

    /// This node's index within its shard.
    #[arg(long, default_value_t = 0)]
    pub node_index: usize,

    /// This node's shard.
    #[arg(long, default_value_t = 0)]
    pub shard_index: usize,

    /// Validators per shard.
    #[arg(long, default_value_t = DEFAULT_PEER_COUNT)]
    pub peer_count: usize,

    /// Number of shards keys are partitioned across.
    #[arg(long, default_value_t = 1)]
    pub num_shards: usize,

    /// Transactions folded into one proposal.
    #[arg(long = "tx-batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    pub tx_batch_size: usize,

    /// Threads in the validator worker pool.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub num_validator_threads: usize,

    /// Threads in the consensus worker pool.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub num_consensus_threads: usize,

    /// Threads in the internetwork worker pool.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub num_internetwork_threads: usize,

    /// Capacity of each worker queue.
    #[arg(long, default_value_t = 1024)]
    pub queue_capacity: usize,

    /// INN key file (`<hex address>\n<PEM>` records).
    #[arg(long)]
    pub inn_keys: Option<PathBuf>,

    /// Node key file.
    #[arg(long)]
    pub node_keys: Option<PathBuf>,

    /// Wallet key file.
    #[arg(long)]
    pub wallet_keys: Option<PathBuf>,

    /// Password for the encrypted key files.
    #[arg(long, default_value = "")]
    #[serde(skip)]
    pub key_pass: String,

    /// Generate this many demo transactions and drive an in-process shard
    /// with them instead of attaching to a transport.
    #[arg(long, default_value_t = 0)]
    pub generate: usize,

    /// Write each finalized block to `<height>.blk` in this directory on
    /// shutdown.
    #[arg(long)]
    pub block_dir: Option<PathBuf>,
}

impl NodeConfig {
    /// The shard context this configuration describes.
    pub fn shard_context(&self) -> ShardContext {
        ShardContext::new(self.node_index, self.shard_index, self.mode.into())
            .with_peer_count(self.peer_count)
            .with_batch_size(self.tx_batch_size)
    }

    /// Whether all three key files were supplied.
    pub fn has_key_files(&self) -> bool {
        self.inn_keys.is_some() && self.node_keys.is_some() && self.wallet_keys.is_some()
    }
}
