//! Action types for the deterministic state machine.

use crate::{Notification, TimerId};
use palisade_messages::WireMessage;
use palisade_types::Host;
use std::time::Duration;

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions; I/O results come back as events.
#[derive(Debug, Clone)]
pub enum Action {
    /// Send a signed message to one peer over its point-to-point channel.
    Send {
        /// The destination replica.
        to: Host,
        /// The record to encode and send.
        message: WireMessage,
    },

    /// Open (or re-open) the outbound connection to a peer.
    Connect {
        /// The peer to dial.
        host: Host,
    },

    /// Set a timer to fire after a duration. An existing timer with the
    /// same id is replaced.
    SetTimer {
        /// Which timer.
        id: TimerId,
        /// Delay until it fires.
        duration: Duration,
    },

    /// Cancel a previously set timer. Idempotent; a cancellation racing
    /// with a firing may still deliver the firing.
    CancelTimer {
        /// Which timer.
        id: TimerId,
    },

    /// Deliver an upcall to the embedding application.
    Notify {
        /// The upcall.
        notification: Notification,
    },
}

impl Action {
    /// Get the action type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Send { .. } => "Send",
            Action::Connect { .. } => "Connect",
            Action::SetTimer { .. } => "SetTimer",
            Action::CancelTimer { .. } => "CancelTimer",
            Action::Notify { .. } => "Notify",
        }
    }
}
