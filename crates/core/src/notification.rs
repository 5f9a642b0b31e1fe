//! Upcalls delivered to the embedding application.

use palisade_types::{Host, Signature};

/// Notifications surfaced by the engine.
///
/// These are passive records describing protocol progress; the runner
/// forwards them to whatever is driving the replica.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Emitted once, after the replica's transport is ready.
    Initial {
        /// This replica's identity.
        replica: Host,
    },

    /// Emitted at initialization (installing the first view) and on every
    /// successful view installation thereafter.
    ViewInstalled {
        /// The ordered member list of the installed view.
        members: Vec<Host>,
        /// The installed view number.
        view_number: u32,
    },

    /// A payload reached commit quorum. Carries the replica's own signature
    /// over the payload so the application can attest delivery.
    Committed {
        /// The agreed payload.
        payload: Vec<u8>,
        /// Local signature over the payload bytes.
        signature: Signature,
    },

    /// The leader has been silent past the timeout. View-change trigger;
    /// the recovery subprotocol is up to the application for now.
    LeaderSuspected {
        /// The view whose leader went quiet.
        view_number: u32,
    },
}

impl Notification {
    /// Get the notification type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Notification::Initial { .. } => "Initial",
            Notification::ViewInstalled { .. } => "ViewInstalled",
            Notification::Committed { .. } => "Committed",
            Notification::LeaderSuspected { .. } => "LeaderSuspected",
        }
    }
}
