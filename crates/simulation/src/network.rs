//! Simulated network with deterministic latency, packet loss, partitions,
//! and selective per-kind message drops.

use crate::NodeIndex;
use palisade_messages::MessageKind;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::time::Duration;

/// Configuration for the simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Number of replicas in the group.
    pub num_replicas: u32,
    /// Base one-way message latency.
    pub latency: Duration,
    /// Jitter as a fraction of base latency (0.0 - 1.0).
    pub jitter_fraction: f64,
    /// Packet loss rate (0.0 - 1.0). Messages are dropped with this probability.
    pub packet_loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_replicas: 4,
            latency: Duration::from_millis(10),
            jitter_fraction: 0.1,
            packet_loss_rate: 0.0,
        }
    }
}

/// Simulated network for deterministic message delivery.
///
/// Supports:
/// - Configurable latency with jitter
/// - Packet loss (probabilistic message drops)
/// - Network partitions (blocking communication between node pairs)
/// - Inbound drop rules (discarding one message kind at one replica)
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    /// Partitioned node pairs. If `(a, b)` is in this set, messages from `a`
    /// to `b` are dropped. Directional; insert both orders for a full cut.
    partitions: HashSet<(NodeIndex, NodeIndex)>,
    /// `(to, kind)` pairs whose inbound delivery is suppressed.
    drop_rules: HashSet<(NodeIndex, MessageKind)>,
}

impl SimulatedNetwork {
    /// Creates a network over `config.num_replicas` nodes.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            partitions: HashSet::new(),
            drop_rules: HashSet::new(),
        }
    }

    // ── Partition management ──

    /// Whether a message from `from` to `to` would be dropped by a partition.
    pub fn is_partitioned(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.partitions.contains(&(from, to))
    }

    /// Blocks messages from `from` to `to` only.
    pub fn partition_unidirectional(&mut self, from: NodeIndex, to: NodeIndex) {
        self.partitions.insert((from, to));
    }

    /// Blocks messages between two nodes in both directions.
    pub fn partition_bidirectional(&mut self, a: NodeIndex, b: NodeIndex) {
        self.partitions.insert((a, b));
        self.partitions.insert((b, a));
    }

    /// Cuts a node off from every other node.
    pub fn isolate_node(&mut self, node: NodeIndex) {
        for other in self.all_nodes() {
            if other != node {
                self.partitions.insert((node, other));
                self.partitions.insert((other, node));
            }
        }
    }

    /// Removes every partition.
    pub fn heal_all(&mut self) {
        self.partitions.clear();
    }

    /// Number of active directional partition pairs.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    // ── Drop rules ──

    /// Suppresses inbound delivery of one message kind at one replica.
    pub fn drop_inbound(&mut self, to: NodeIndex, kind: MessageKind) {
        self.drop_rules.insert((to, kind));
    }

    /// Whether an inbound message of `kind` at `to` is suppressed.
    pub fn is_dropped(&self, to: NodeIndex, kind: MessageKind) -> bool {
        self.drop_rules.contains(&(to, kind))
    }

    /// Removes every drop rule.
    pub fn clear_drop_rules(&mut self) {
        self.drop_rules.clear();
    }

    // ── Delivery decision ──

    /// Decides delivery of one message. Returns `None` if the message is
    /// dropped (partition, drop rule, or packet loss), `Some(latency)`
    /// otherwise.
    pub fn should_deliver(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        kind: MessageKind,
        rng: &mut ChaCha8Rng,
    ) -> Option<Duration> {
        if self.is_partitioned(from, to) {
            return None;
        }
        if self.is_dropped(to, kind) {
            return None;
        }
        if self.config.packet_loss_rate > 0.0 && rng.gen::<f64>() < self.config.packet_loss_rate {
            return None;
        }
        Some(self.sample_latency(rng))
    }

    /// Samples a one-way latency with jitter.
    pub fn sample_latency(&self, rng: &mut ChaCha8Rng) -> Duration {
        let base = self.config.latency;
        let jitter_range = base.as_secs_f64() * self.config.jitter_fraction;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };
        Duration::from_secs_f64((base.as_secs_f64() + jitter).max(0.001))
    }

    /// All node indices in the group.
    pub fn all_nodes(&self) -> Vec<NodeIndex> {
        (0..self.config.num_replicas).collect()
    }

    /// The network configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}
