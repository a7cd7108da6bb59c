//! Shard addressing and consensus constants.

use devv_primitives::AppMode;

/// Percent of a shard that must co-sign a proposal.
pub const VALIDATION_PERCENT: u32 = 51;

/// How long the process supervisor allows a proposal to gather votes.
pub const PROPOSAL_TIMEOUT_MS: u64 = 60_000;

/// Validators per shard unless configured otherwise.
pub const DEFAULT_PEER_COUNT: usize = 3;

/// Transactions folded into one proposal unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Topic prefix for in-shard broadcast.
pub const SHARD_URI_PREFIX: &str = "shard-";

/// Topic prefix for point-to-point delivery.
pub const REMOTE_URI_PREFIX: &str = "RemoteURI-";

/// Runtime identity and consensus parameters of one validator process.
#[derive(Debug, Clone)]
pub struct ShardContext {
    node_index: usize,
    shard_index: usize,
    peer_count: usize,
    batch_size: usize,
    mode: AppMode,
}

impl ShardContext {
    /// A context with default peer count and batch size.
    pub fn new(node_index: usize, shard_index: usize, mode: AppMode) -> Self {
        Self {
            node_index,
            shard_index,
            peer_count: DEFAULT_PEER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            mode,
        }
    }

    /// Override the shard's peer count.
    pub fn with_peer_count(mut self, peer_count: usize) -> Self {
        self.peer_count = peer_count.max(1);
        self
    }

    /// Override the proposal batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// This process's node index.
    pub fn node_index(&self) -> usize {
        self.node_index
    }

    /// This process's shard index.
    pub fn shard_index(&self) -> usize {
        self.shard_index
    }

    /// Validators in this shard.
    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    /// Transactions folded into one proposal.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Which tier this process runs.
    pub fn mode(&self) -> AppMode {
        self.mode
    }

    /// The node's position within the shard's rotation.
    ///
    /// Indices are reduced modulo the peer count, so sparse global node
    /// numbering degrades to its residue class.
    pub fn peer_index(&self) -> usize {
        self.node_index % self.peer_count
    }

    /// Whether this node proposes at the given height.
    pub fn is_leader_turn(&self, height: u64) -> bool {
        height % self.peer_count as u64 == (self.node_index % self.peer_count) as u64
    }

    /// Total signatures a proposal needs before it finalizes: the proposer
    /// plus [`VALIDATION_PERCENT`] of the shard's peers, rounded up.
    ///
    /// At the default three peers that is the proposer and both others'
    /// co-signatures; one peer alone never finalizes.
    pub fn finalize_signature_count(&self) -> usize {
        (self.peer_count * VALIDATION_PERCENT as usize).div_ceil(100) + 1
    }

    /// This shard's broadcast topic.
    pub fn shard_uri(&self) -> String {
        format!("{SHARD_URI_PREFIX}{}", self.shard_index)
    }

    /// The point-to-point topic of a node by global index.
    pub fn node_uri(node_index: usize) -> String {
        format!("{REMOTE_URI_PREFIX}{node_index}")
    }

    /// This process's own point-to-point topic.
    pub fn own_uri(&self) -> String {
        Self::node_uri(self.node_index + self.shard_index * self.peer_count)
    }
}
