//! Core types for the Palisade replication engine.
//!
//! This crate provides the vocabulary of the event-driven architecture:
//!
//! - [`Event`]: All possible inputs to the state machine
//! - [`Action`]: All possible outputs from the state machine
//! - [`EventPriority`]: Ordering priority for events at the same timestamp
//! - [`Notification`]: Upcalls delivered to the embedding application
//! - [`StateMachine`]: The trait the replica state machine implements
//!
//! # Architecture
//!
//! The engine is built on a simple event-driven model:
//!
//! ```text
//! Events → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: Same state + event = same actions
//! - **Pure-ish**: Mutates self, but performs no I/O
//!
//! All I/O is handled by the runner (simulation or production) which:
//! 1. Delivers events to the state machine
//! 2. Executes the returned actions
//! 3. Converts transport and timer results back into events
//!
//! Because exactly one handler runs at a time and handlers run to
//! completion, the engine's mutable state needs no locks.

mod action;
mod event;
mod notification;
mod traits;

pub use action::Action;
pub use event::{Event, EventPriority};
pub use notification::Notification;
pub use traits::StateMachine;

use palisade_types::Host;

/// Timer identification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Periodic leader-liveness check on every replica.
    Leader,
    /// Idle heartbeat on the leader, re-armed after each commit.
    NoOp,
    /// One-shot reconnect attempt for a failed peer connection.
    Reconnect(Host),
}
