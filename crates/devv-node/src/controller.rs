//! The controller: three worker pools wired to the message bus.
//!
//! Inbound frames are routed by type: transaction announcements to the
//! validator pool, the block-exchange messages to the internetwork pool,
//! and everything else to consensus. Handlers lock the transaction pool
//! first and the chain second, everywhere, so the three pools never
//! deadlock against each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use devv_bus::{LoopbackBus, Message, MessagePublisher, MessageType, ShardContext};
use devv_chain::Blockchain;
use devv_concurrency::{MpmcQueue, WorkerPool};
use devv_consensus as consensus;
use devv_keys::KeyRing;
use devv_pool::{PoolStats, TransactionPool};

/// Shared state the worker callbacks operate on.
struct ControllerCore {
    ctx: ShardContext,
    keys: Arc<KeyRing>,
    chain: RwLock<Blockchain>,
    pool: Mutex<TransactionPool>,
    remote_blocks: Mutex<u64>,
    publisher: Arc<dyn MessagePublisher>,
    validator_queue: Arc<MpmcQueue<Message>>,
    consensus_queue: Arc<MpmcQueue<Message>>,
    internetwork_queue: Arc<MpmcQueue<Message>>,
}

impl ControllerCore {
    /// Route an inbound frame to the worker pool that owns its type.
    fn route(&self, message: Message) {
        let queue = match message.message_type {
            MessageType::TransactionAnnouncement => &self.validator_queue,
            MessageType::RequestBlock
            | MessageType::GetBlocksSince
            | MessageType::BlocksSince => &self.internetwork_queue,
            _ => &self.consensus_queue,
        };
        if !queue.push(message) {
            debug!("message dropped during shutdown");
        }
    }

    fn validator_callback(&self, message: Message) {
        match message.message_type {
            MessageType::TransactionAnnouncement => {
                let mut pool = self.pool.lock();
                let chain = self.chain.read();
                if let Err(error) = consensus::handle_transaction_announcement(
                    &message,
                    &self.ctx,
                    &self.keys,
                    &chain,
                    &mut pool,
                    &self.publisher,
                ) {
                    warn!(%error, "transaction announcement failed");
                }
            }
            _ => {
                debug!("unexpected message at validator, to consensus");
                if !self.consensus_queue.push(message) {
                    debug!("message dropped during shutdown");
                }
            }
        }
    }

    fn consensus_callback(&self, message: Message) {
        let result = match message.message_type {
            MessageType::ProposalBlock => {
                let chain = self.chain.read();
                consensus::handle_proposal_block(
                    &message,
                    &self.ctx,
                    &self.keys,
                    &chain,
                    &self.publisher,
                )
            }
            MessageType::Valid => {
                let mut pool = self.pool.lock();
                let mut chain = self.chain.write();
                consensus::handle_validation(
                    &message,
                    &self.ctx,
                    &self.keys,
                    &mut chain,
                    &mut pool,
                    &self.publisher,
                )
            }
            MessageType::FinalBlock => {
                let mut pool = self.pool.lock();
                let mut chain = self.chain.write();
                consensus::handle_final_block(
                    &message,
                    &self.ctx,
                    &self.keys,
                    &mut chain,
                    &mut pool,
                    &self.publisher,
                )
            }
            MessageType::TransactionAnnouncement => {
                debug!("unexpected message at consensus, to validator");
                if !self.validator_queue.push(message) {
                    debug!("message dropped during shutdown");
                }
                return;
            }
            _ => {
                if !self.internetwork_queue.push(message) {
                    debug!("message dropped during shutdown");
                }
                return;
            }
        };
        if let Err(error) = result {
            warn!(%error, "consensus handler failed");
        }
    }

    fn internetwork_callback(&self, message: Message) {
        let result = match message.message_type {
            MessageType::GetBlocksSince => {
                let chain = self.chain.read();
                consensus::handle_blocks_since_request(
                    &message,
                    &self.ctx,
                    &self.keys,
                    &chain,
                    &self.publisher,
                )
            }
            MessageType::BlocksSince => {
                let mut remote_blocks = self.remote_blocks.lock();
                let mut chain = self.chain.write();
                consensus::handle_blocks_since(
                    &message,
                    &self.ctx,
                    &self.keys,
                    &mut chain,
                    &mut remote_blocks,
                )
            }
            MessageType::RequestBlock => {
                debug!("REQUEST_BLOCK is unused, ignoring");
                return;
            }
            _ => {
                debug!("unexpected message at internetwork, to consensus");
                if !self.consensus_queue.push(message) {
                    debug!("message dropped during shutdown");
                }
                return;
            }
        };
        if let Err(error) = result {
            warn!(%error, "internetwork handler failed");
        }
    }
}

/// One validator process: chain, pool, key ring, and the three worker
/// pools, connected to a publisher.
pub struct Controller {
    core: Arc<ControllerCore>,
    keep_running: Arc<AtomicBool>,
    pools: Vec<WorkerPool<Message>>,
}

impl Controller {
    /// Build the worker topology and start its threads.
    pub fn start(
        ctx: ShardContext,
        keys: Arc<KeyRing>,
        publisher: Arc<dyn MessagePublisher>,
        validator_threads: usize,
        consensus_threads: usize,
        internetwork_threads: usize,
        queue_capacity: usize,
    ) -> Self {
        let core = Arc::new(ControllerCore {
            pool: Mutex::new(TransactionPool::from_context(&ctx)),
            chain: RwLock::new(Blockchain::new(format!(
                "shard-{}-node-{}",
                ctx.shard_index(),
                ctx.node_index()
            ))),
            remote_blocks: Mutex::new(0),
            ctx,
            keys,
            publisher,
            validator_queue: Arc::new(MpmcQueue::new(queue_capacity)),
            consensus_queue: Arc::new(MpmcQueue::new(queue_capacity)),
            internetwork_queue: Arc::new(MpmcQueue::new(queue_capacity)),
        });
        let keep_running = Arc::new(AtomicBool::new(true));

        let validator_core = Arc::clone(&core);
        let consensus_core = Arc::clone(&core);
        let internetwork_core = Arc::clone(&core);
        let pools = vec![
            WorkerPool::start(
                "validator",
                validator_threads,
                Arc::clone(&core.validator_queue),
                Arc::clone(&keep_running),
                Arc::new(move |message| validator_core.validator_callback(message)),
            ),
            WorkerPool::start(
                "consensus",
                consensus_threads,
                Arc::clone(&core.consensus_queue),
                Arc::clone(&keep_running),
                Arc::new(move |message| consensus_core.consensus_callback(message)),
            ),
            WorkerPool::start(
                "internetwork",
                internetwork_threads,
                Arc::clone(&core.internetwork_queue),
                Arc::clone(&keep_running),
                Arc::new(move |message| internetwork_core.internetwork_callback(message)),
            ),
        ];

        Self {
            core,
            keep_running,
            pools,
        }
    }

    /// Subscribe this controller's inbound routing to a loopback bus on
    /// its shard topic and its own point-to-point topic.
    pub fn attach(&self, bus: &LoopbackBus) {
        let shard_core = Arc::clone(&self.core);
        bus.subscribe(self.core.ctx.shard_uri(), move |message| {
            shard_core.route(message);
        });
        let own_core = Arc::clone(&self.core);
        bus.subscribe(self.core.ctx.own_uri(), move |message| {
            own_core.route(message);
        });
    }

    /// Feed one inbound frame into the worker topology.
    pub fn route(&self, message: Message) {
        self.core.route(message);
    }

    /// This controller's shard context.
    pub fn ctx(&self) -> &ShardContext {
        &self.core.ctx
    }

    /// Current chain height.
    pub fn chain_height(&self) -> usize {
        self.core.chain.read().len()
    }

    /// Balance of one coin at one address in the rolling state.
    pub fn balance(&self, coin: u64, addr: &devv_primitives::Address) -> i64 {
        self.core.chain.read().highest_chain_state().amount(coin, addr)
    }

    /// Transactions awaiting proposal.
    pub fn pending_count(&self) -> usize {
        self.core.pool.lock().pending_count()
    }

    /// Canonical bytes of every finalized block, by height. Feeds the
    /// archival `<height>.blk` file layout.
    pub fn block_canonicals(&self) -> Vec<(u64, Vec<u8>)> {
        let chain = self.core.chain.read();
        (0..chain.len() as u64)
            .filter_map(|height| chain.at(height).map(|block| (height, block.canonical())))
            .collect()
    }

    /// A snapshot of the pool's counters.
    pub fn pool_stats(&self) -> PoolStats {
        *self.core.pool.lock().stats()
    }

    /// Whether the in-flight queues are drained.
    pub fn queues_idle(&self) -> bool {
        self.core.validator_queue.is_empty()
            && self.core.consensus_queue.is_empty()
            && self.core.internetwork_queue.is_empty()
    }

    /// Request blocks from remote shards when the local chain has grown
    /// past the watermark. Called from the process's main wait loop.
    pub fn maybe_request_remote_blocks(&self) -> bool {
        let height = self.core.chain.read().len() as u64;
        let mut remote_blocks = self.core.remote_blocks.lock();
        consensus::request_remote_blocks(
            &self.core.ctx,
            height,
            &mut remote_blocks,
            &self.core.publisher,
        )
    }

    /// Stop the worker threads, draining queued messages first.
    pub fn shutdown(mut self) {
        self.keep_running.store(false, Ordering::Release);
        for pool in self.pools.drain(..) {
            pool.stop();
        }
    }
}
