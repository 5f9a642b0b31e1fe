//! Production runner for the Palisade replication engine.
//!
//! Everything the synchronous state machine delegates to its environment
//! lives here: the authenticated point-to-point TCP transport, the tokio
//! timer subsystem, the configuration loader, and the event loop that wires
//! them to [`palisade_pbft::PbftState`]. Upcalls reach the embedding
//! application through a notification channel.

mod config;
pub mod network;
mod runner;
mod timers;

pub use config::{ConfigError, ReplicaConfig};
pub use network::{TcpAdapter, TransportError};
pub use runner::{BootstrapError, ProductionRunner, ReplicaHandle};
pub use timers::TimerManager;
