//! The `devv-validator` binary.
//!
//! With `--generate N` the process runs a whole shard in-process over the
//! loopback bus: `peer_count` controllers share one key ring, N demo
//! transactions are announced, and the run exits once every node has
//! finalized them. Without it, a single controller is started and left
//! attached to the loopback bus as the integration point for an external
//! transport adapter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use devv_bus::{LoopbackBus, Message, MessagePublisher, MessageType, ShardContext};
use devv_keys::KeyRing;
use devv_node::{generate_transactions, Controller, NodeConfig};

/// Sleep between main-loop progress checks.
const MAIN_WAIT_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    devv_node::telemetry::init();
    let config = NodeConfig::parse();
    info!(?config, "starting devv validator");

    let keys = Arc::new(load_keys(&config)?);

    if config.generate > 0 {
        run_demo_shard(&config, keys)
    } else {
        run_single_node(&config, keys)
    }
}

fn load_keys(config: &NodeConfig) -> anyhow::Result<KeyRing> {
    if config.has_key_files() {
        let ring = KeyRing::load(
            config.inn_keys.as_deref().expect("checked by has_key_files"),
            config.node_keys.as_deref().expect("checked by has_key_files"),
            config
                .wallet_keys
                .as_deref()
                .expect("checked by has_key_files"),
            &config.key_pass,
            config.num_shards,
        )
        .context("loading key files")?;
        return Ok(ring);
    }
    info!("no key files supplied, generating a fresh key ring");
    Ok(KeyRing::generate(config.peer_count, 4, config.num_shards))
}

fn start_controller(
    config: &NodeConfig,
    node_index: usize,
    keys: Arc<KeyRing>,
    bus: &Arc<LoopbackBus>,
) -> Controller {
    let ctx = ShardContext::new(node_index, config.shard_index, config.mode.into())
        .with_peer_count(config.peer_count)
        .with_batch_size(config.tx_batch_size);
    let controller = Controller::start(
        ctx,
        keys,
        Arc::clone(bus) as Arc<dyn MessagePublisher>,
        config.num_validator_threads,
        config.num_consensus_threads,
        config.num_internetwork_threads,
        config.queue_capacity,
    );
    controller.attach(bus);
    controller
}

fn run_single_node(config: &NodeConfig, keys: Arc<KeyRing>) -> anyhow::Result<()> {
    let bus = Arc::new(LoopbackBus::new());
    let controller = start_controller(config, config.node_index, keys, &bus);
    info!(uri = %controller.ctx().own_uri(), "validator attached, waiting for traffic");

    loop {
        std::thread::sleep(MAIN_WAIT_INTERVAL);
        controller.maybe_request_remote_blocks();
    }
}

fn run_demo_shard(config: &NodeConfig, keys: Arc<KeyRing>) -> anyhow::Result<()> {
    let bus = Arc::new(LoopbackBus::new());
    let controllers: Vec<Controller> = (0..config.peer_count)
        .map(|node| start_controller(config, node, Arc::clone(&keys), &bus))
        .collect();

    let ctx = controllers[0].ctx().clone();
    let batches = generate_transactions(&keys, &ctx, config.generate, config.tx_batch_size);

    let mut announced = 0;
    let mut last_heights = Vec::new();
    let mut stalled_rounds = 0;
    loop {
        std::thread::sleep(MAIN_WAIT_INTERVAL);

        if announced < batches.len() {
            bus.publish(Message::new(
                ctx.shard_uri(),
                MessageType::TransactionAnnouncement,
                batches[announced].clone(),
                announced as u32,
            ));
            announced += 1;
            continue;
        }

        let heights: Vec<usize> = controllers.iter().map(Controller::chain_height).collect();
        let drained = controllers
            .iter()
            .all(|c| c.pending_count() == 0 && c.queues_idle());
        info!(?heights, drained, "demo progress");

        if drained && heights.iter().all(|h| *h == heights[0]) && heights[0] > 0 {
            info!("all transactions processed, shutting down");
            break;
        }

        // Transactions that never validate (spent-out wallets) can leave
        // the shard idle without draining; stop once progress ends.
        if heights == last_heights {
            stalled_rounds += 1;
            if stalled_rounds > 100 {
                warn!(?heights, "no further progress, shutting down");
                break;
            }
        } else {
            last_heights = heights;
            stalled_rounds = 0;
        }
    }

    if let Some(dir) = &config.block_dir {
        write_block_files(&controllers[0], dir)?;
    }

    for controller in controllers {
        controller.shutdown();
    }
    Ok(())
}

/// Persist the final chain as one `<height>.blk` file per block.
fn write_block_files(controller: &Controller, dir: &std::path::Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).context("creating block directory")?;
    let blocks = controller.block_canonicals();
    for (height, canonical) in &blocks {
        std::fs::write(dir.join(format!("{height}.blk")), canonical)
            .with_context(|| format!("writing block {height}"))?;
    }
    info!(blocks = blocks.len(), dir = %dir.display(), "final chain written");
    Ok(())
}
