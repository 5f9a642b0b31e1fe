//! Deterministic simulation harness.
//!
//! Runs a whole replica group inside one thread with simulated time: a
//! seeded RNG drives latency jitter and packet loss, a totally-ordered
//! event queue drives the state machines, and every action a replica emits
//! is executed inline. Given the same seed, a simulation produces identical
//! results every run, which is what makes the adversarial scenarios
//! (partitions, drops, forged signatures) assertable.

mod event_queue;
mod network;
mod runner;

pub use event_queue::EventKey;
pub use network::{NetworkConfig, SimulatedNetwork};
pub use runner::{derive_secret, SimulationRunner, SimulationStats};

/// Index type for simulation-only replica routing. Production addresses
/// replicas by `Host`.
pub type NodeIndex = u32;
