//! Threaded shard runs over the worker topology.
//!
//! These tests exercise the real runtime path: three controllers with
//! their own worker pools and queues, wired to one loopback bus, fed by
//! the demo generator.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use devv_bus::{LoopbackBus, Message, MessagePublisher, MessageType, ShardContext};
    use devv_keys::KeyRing;
    use devv_node::{generate_transactions, Controller};
    use devv_primitives::AppMode;

    fn wait_for(predicate: impl Fn() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        predicate()
    }

    fn start_shard(
        keys: &Arc<KeyRing>,
        bus: &Arc<LoopbackBus>,
        peer_count: usize,
    ) -> Vec<Controller> {
        (0..peer_count)
            .map(|node| {
                let ctx = ShardContext::new(node, 0, AppMode::Tier2)
                    .with_peer_count(peer_count)
                    .with_batch_size(500);
                let controller = Controller::start(
                    ctx,
                    Arc::clone(keys),
                    Arc::clone(bus) as Arc<dyn MessagePublisher>,
                    2,
                    2,
                    1,
                    128,
                );
                controller.attach(bus);
                controller
            })
            .collect()
    }

    #[test]
    fn test_shard_finalizes_generated_traffic() {
        let keys = Arc::new(KeyRing::generate(3, 3, 1));
        let bus = Arc::new(LoopbackBus::new());
        let controllers = start_shard(&keys, &bus, 3);

        let ctx = controllers[0].ctx().clone();
        for (index, batch) in generate_transactions(&keys, &ctx, 6, 3)
            .into_iter()
            .enumerate()
        {
            bus.publish(Message::new(
                ctx.shard_uri(),
                MessageType::TransactionAnnouncement,
                batch,
                index as u32,
            ));
            // Let a round land between announcements, as the wire would.
            std::thread::sleep(Duration::from_millis(100));
        }

        let converged = wait_for(
            || {
                let heights: Vec<usize> =
                    controllers.iter().map(Controller::chain_height).collect();
                heights[0] >= 1 && heights.iter().all(|h| *h == heights[0])
                    && controllers.iter().all(Controller::queues_idle)
            },
            Duration::from_secs(20),
        );
        assert!(converged, "shard did not converge over the worker runtime");

        // Chain tails agree, so state agrees; spot-check a balance.
        let reference = controllers[0].balance(0, keys.wallet_address(0).unwrap());
        for controller in &controllers {
            assert_eq!(
                controller.balance(0, keys.wallet_address(0).unwrap()),
                reference
            );
        }

        for controller in controllers {
            controller.shutdown();
        }
    }

    #[test]
    fn test_counters_visible_through_controller() {
        let keys = Arc::new(KeyRing::generate(3, 2, 1));
        let bus = Arc::new(LoopbackBus::new());
        let controllers = start_shard(&keys, &bus, 3);

        // A malformed frame payload: dropped and counted on every node.
        bus.publish(Message::new(
            "shard-0",
            MessageType::TransactionAnnouncement,
            vec![0xDE, 0xAD, 0xBE, 0xEF],
            0,
        ));

        let counted = wait_for(
            || {
                controllers
                    .iter()
                    .all(|c| c.pool_stats().rejected_malformed == 1)
            },
            Duration::from_secs(5),
        );
        assert!(counted, "malformed batch was not counted everywhere");
        assert!(controllers.iter().all(|c| c.chain_height() == 0));

        for controller in controllers {
            controller.shutdown();
        }
    }
}
