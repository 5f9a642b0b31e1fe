//! Deterministic simulation runner.
//!
//! Processes events in deterministic order and executes actions inline.
//! Given the same seed, a run produces identical results. Each replica is a
//! separate [`PbftState`] with its own keys; the runner plays the role the
//! production transport and timer subsystem play on a real deployment.

use crate::event_queue::EventKey;
use crate::network::{NetworkConfig, SimulatedNetwork};
use crate::NodeIndex;
use palisade_core::{Action, Event, Notification, StateMachine, TimerId};
use palisade_messages::WireMessage;
use palisade_pbft::{PbftConfig, PbftState};
use palisade_types::{Host, ProposeRequest, SecretKey, Truststore};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Base port for simulated replica hosts.
const BASE_PORT: u16 = 5000;

/// Derives the signing key of a simulated replica. Deterministic in
/// `(seed, index)`, so tests can recompute any replica's key.
pub fn derive_secret(seed: u64, index: NodeIndex) -> SecretKey {
    let mut seed_bytes = [0u8; 32];
    let key_seed = seed
        .wrapping_add(index as u64)
        .wrapping_mul(0x517cc1b727220a95);
    seed_bytes[..8].copy_from_slice(&key_seed.to_le_bytes());
    seed_bytes[8..16].copy_from_slice(&(index as u64).to_le_bytes());
    SecretKey::from_seed(&seed_bytes)
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Total actions generated.
    pub actions_generated: u64,
    /// Messages scheduled for delivery.
    pub messages_sent: u64,
    /// Messages dropped by partitions, drop rules, or packet loss.
    pub messages_dropped: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled.
    pub timers_cancelled: u64,
}

/// Deterministic simulation runner over a group of replicas.
pub struct SimulationRunner {
    /// All replicas, indexed by [`NodeIndex`].
    nodes: Vec<PbftState>,

    /// Replica hosts, same indexing.
    hosts: Vec<Host>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    /// Network simulator.
    network: SimulatedNetwork,

    /// RNG for network conditions (seeded for determinism).
    rng: ChaCha8Rng,

    /// Timer registry for cancellation and replacement.
    timers: HashMap<(NodeIndex, TimerId), EventKey>,

    /// Upcalls delivered per replica, in delivery order.
    notifications: Vec<Vec<Notification>>,

    /// Statistics.
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Creates a runner over `network_config.num_replicas` replicas.
    pub fn new(network_config: NetworkConfig, pbft_config: PbftConfig, seed: u64) -> Self {
        let num_replicas = network_config.num_replicas;
        let hosts: Vec<Host> = (0..num_replicas)
            .map(|i| Host::new(Ipv4Addr::LOCALHOST, BASE_PORT + i as u16))
            .collect();

        let secrets: Vec<SecretKey> = (0..num_replicas)
            .map(|i| derive_secret(seed, i))
            .collect();

        let mut truststore = Truststore::new();
        for (i, secret) in secrets.iter().enumerate() {
            truststore.insert(format!("replica-{i}"), secret.public());
        }

        let nodes: Vec<PbftState> = secrets
            .into_iter()
            .enumerate()
            .map(|(i, secret)| {
                PbftState::new(
                    hosts[i],
                    hosts.clone(),
                    format!("replica-{i}"),
                    secret,
                    truststore.clone(),
                    pbft_config.clone(),
                )
            })
            .collect();

        debug!(replicas = num_replicas, seed, "created simulation runner");

        Self {
            notifications: vec![Vec::new(); nodes.len()],
            nodes,
            hosts,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network: SimulatedNetwork::new(network_config),
            rng: ChaCha8Rng::seed_from_u64(seed),
            timers: HashMap::new(),
            stats: SimulationStats::default(),
        }
    }

    // ── Accessors ──

    /// A replica by index.
    pub fn node(&self, index: NodeIndex) -> &PbftState {
        &self.nodes[index as usize]
    }

    /// A replica's host.
    pub fn host(&self, index: NodeIndex) -> Host {
        self.hosts[index as usize]
    }

    /// Upcalls a replica has received so far, in delivery order.
    pub fn notifications(&self, index: NodeIndex) -> &[Notification] {
        &self.notifications[index as usize]
    }

    /// Payloads a replica has delivered, in commit order.
    pub fn committed_payloads(&self, index: NodeIndex) -> Vec<Vec<u8>> {
        self.notifications(index)
            .iter()
            .filter_map(|n| match n {
                Notification::Committed { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Suspect-leader upcalls a replica has received.
    pub fn leader_suspicions(&self, index: NodeIndex) -> usize {
        self.notifications(index)
            .iter()
            .filter(|n| matches!(n, Notification::LeaderSuspected { .. }))
            .count()
    }

    /// Simulation statistics.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Current simulation time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Mutable access to the network for partitions and drop rules.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    // ── Driving the simulation ──

    /// Initializes every replica: installs the first view and arms the
    /// leader-liveness timers.
    pub fn initialize(&mut self) {
        for index in 0..self.nodes.len() as NodeIndex {
            let node = &mut self.nodes[index as usize];
            node.set_time(self.now);
            let actions = node.init();
            for action in actions {
                self.process_action(index, action);
            }
        }
    }

    /// Submits a propose request to one replica at the current time.
    pub fn submit(&mut self, node: NodeIndex, request: ProposeRequest) {
        self.schedule_event(node, self.now, Event::Propose { request });
    }

    /// Schedules an arbitrary event, e.g. an adversarial message.
    pub fn schedule_initial_event(&mut self, node: NodeIndex, delay: Duration, event: Event) {
        let time = self.now + delay;
        self.schedule_event(node, time, event);
    }

    /// Runs until the queue drains or the time limit is reached.
    pub fn run_until(&mut self, end_time: Duration) {
        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                break;
            }

            let (key, event) = self
                .event_queue
                .pop_first()
                .expect("non-empty queue has a first entry");
            self.now = key.time;
            let node_index = key.node;

            trace!(time = ?self.now, node = node_index, event = event.type_name(), "processing");
            self.stats.events_processed += 1;

            let node = &mut self.nodes[node_index as usize];
            node.set_time(self.now);
            let actions = node.handle(event);
            self.stats.actions_generated += actions.len() as u64;

            for action in actions {
                self.process_action(node_index, action);
            }
        }
        self.now = self.now.max(end_time);
    }

    // ── Action execution ──

    fn process_action(&mut self, from: NodeIndex, action: Action) {
        match action {
            Action::Send { to, message } => {
                let Some(to_index) = self.index_of(to) else {
                    warn!(%to, "send to a host outside the simulated group; dropping");
                    return;
                };
                let kind = message.kind();
                match self.network.should_deliver(from, to_index, kind, &mut self.rng) {
                    Some(latency) => {
                        let event = Self::message_to_event(self.hosts[from as usize], message);
                        let time = self.now + latency;
                        self.schedule_event(to_index, time, event);
                        self.stats.messages_sent += 1;
                    }
                    None => {
                        trace!(from, to = to_index, kind = ?kind, "message dropped");
                        self.stats.messages_dropped += 1;
                    }
                }
            }

            Action::Connect { host } => {
                let Some(to_index) = self.index_of(host) else {
                    warn!(%host, "dial to a host outside the simulated group; dropping");
                    return;
                };
                // Connections succeed instantly unless the pair is partitioned.
                let latency = self.network.sample_latency(&mut self.rng);
                let event = if self.network.is_partitioned(from, to_index) {
                    Event::OutboundFailed { host }
                } else {
                    Event::OutboundUp { host }
                };
                let time = self.now + latency;
                self.schedule_event(from, time, event);
            }

            Action::SetTimer { id, duration } => {
                let fire_time = self.now + duration;
                let event = Self::timer_to_event(id.clone());
                let key = self.schedule_event(from, fire_time, event);
                if let Some(stale) = self.timers.insert((from, id), key) {
                    self.event_queue.remove(&stale);
                }
                self.stats.timers_set += 1;
            }

            Action::CancelTimer { id } => {
                if let Some(key) = self.timers.remove(&(from, id)) {
                    self.event_queue.remove(&key);
                    self.stats.timers_cancelled += 1;
                }
            }

            Action::Notify { notification } => {
                debug!(node = from, upcall = notification.type_name(), "notification");
                self.notifications[from as usize].push(notification);
            }
        }
    }

    fn index_of(&self, host: Host) -> Option<NodeIndex> {
        self.hosts
            .iter()
            .position(|&h| h == host)
            .map(|i| i as NodeIndex)
    }

    fn message_to_event(from: Host, message: WireMessage) -> Event {
        match message {
            WireMessage::PrePrepare(message) => Event::PrePrepareReceived { from, message },
            WireMessage::Prepare(message) => Event::PrepareReceived { from, message },
            WireMessage::Commit(message) => Event::CommitReceived { from, message },
        }
    }

    fn timer_to_event(id: TimerId) -> Event {
        match id {
            TimerId::Leader => Event::LeaderTimer,
            TimerId::NoOp => Event::NoOpTimer,
            TimerId::Reconnect(host) => Event::ReconnectTimer { host },
        }
    }

    fn schedule_event(&mut self, node: NodeIndex, time: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, node, self.sequence);
        self.event_queue.insert(key, event);
        key
    }
}
