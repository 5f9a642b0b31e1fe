//! Deterministic ordering key for simulation events.

use crate::NodeIndex;
use palisade_core::{Event, EventPriority};
use std::time::Duration;

/// Total order over scheduled events: delivery time first, then event
/// priority, then target node, then insertion sequence. The sequence
/// counter makes the order total even when everything else ties, so a
/// `BTreeMap<EventKey, Event>` pops events deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    /// Simulated delivery time.
    pub time: Duration,
    priority: EventPriority,
    /// Target replica.
    pub node: NodeIndex,
    seq: u64,
}

impl EventKey {
    /// Builds the key for an event scheduled at `time` for `node`.
    pub fn new(time: Duration, event: &Event, node: NodeIndex, seq: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            node,
            seq,
        }
    }
}
