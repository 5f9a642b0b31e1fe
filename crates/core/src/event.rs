//! Event types for the deterministic state machine.

use palisade_messages::{CommitMessage, PrePrepareMessage, PrepareMessage};
use palisade_types::{Host, ProposeRequest};

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Timer events: scheduled by the replica itself.
    Timer = 0,

    /// Network events: messages and connection changes from peers.
    Network = 1,

    /// Client events: propose requests from the application.
    Client = 2,
}

/// All possible inputs to a replica.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone)]
pub enum Event {
    // ── Timers ──
    /// Periodic leader-liveness check fired.
    LeaderTimer,

    /// Leader idle-heartbeat timer fired.
    NoOpTimer,

    /// Reconnect delay for a peer elapsed.
    ReconnectTimer {
        /// The peer to re-dial.
        host: Host,
    },

    // ── Network messages ──
    /// Received a pre-prepare from a peer.
    PrePrepareReceived {
        /// Transport-level sender.
        from: Host,
        /// The signed record.
        message: PrePrepareMessage,
    },

    /// Received a prepare from a peer.
    PrepareReceived {
        /// Transport-level sender.
        from: Host,
        /// The signed record.
        message: PrepareMessage,
    },

    /// Received a commit from a peer.
    CommitReceived {
        /// Transport-level sender.
        from: Host,
        /// The signed record.
        message: CommitMessage,
    },

    /// A frame from a peer failed to deserialize. Logged and discarded.
    MessageFailed {
        /// The peer whose frame was dropped.
        from: Host,
    },

    // ── Connection events ──
    /// An outbound connection was established.
    OutboundUp {
        /// The connected peer.
        host: Host,
    },

    /// An outbound connection dropped.
    OutboundDown {
        /// The disconnected peer.
        host: Host,
    },

    /// An outbound connection attempt failed.
    OutboundFailed {
        /// The unreachable peer.
        host: Host,
    },

    /// A peer opened a connection to this replica.
    InboundUp {
        /// The connecting peer.
        host: Host,
    },

    /// A peer's inbound connection dropped.
    InboundDown {
        /// The disconnected peer.
        host: Host,
    },

    // ── Client requests ──
    /// The application submitted a payload for ordering.
    Propose {
        /// The request.
        request: ProposeRequest,
    },
}

impl Event {
    /// Get the priority for this event type.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::LeaderTimer | Event::NoOpTimer | Event::ReconnectTimer { .. } => {
                EventPriority::Timer
            }

            Event::PrePrepareReceived { .. }
            | Event::PrepareReceived { .. }
            | Event::CommitReceived { .. }
            | Event::MessageFailed { .. }
            | Event::OutboundUp { .. }
            | Event::OutboundDown { .. }
            | Event::OutboundFailed { .. }
            | Event::InboundUp { .. }
            | Event::InboundDown { .. } => EventPriority::Network,

            Event::Propose { .. } => EventPriority::Client,
        }
    }

    /// Get the event type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::LeaderTimer => "LeaderTimer",
            Event::NoOpTimer => "NoOpTimer",
            Event::ReconnectTimer { .. } => "ReconnectTimer",
            Event::PrePrepareReceived { .. } => "PrePrepareReceived",
            Event::PrepareReceived { .. } => "PrepareReceived",
            Event::CommitReceived { .. } => "CommitReceived",
            Event::MessageFailed { .. } => "MessageFailed",
            Event::OutboundUp { .. } => "OutboundUp",
            Event::OutboundDown { .. } => "OutboundDown",
            Event::OutboundFailed { .. } => "OutboundFailed",
            Event::InboundUp { .. } => "InboundUp",
            Event::InboundDown { .. } => "InboundDown",
            Event::Propose { .. } => "Propose",
        }
    }
}
