//! Totally-ordered sequence identifier.

use crate::Host;
use borsh::{BorshDeserialize, BorshSerialize};

/// A `(counter, node)` pair identifying a position in the proposal order.
///
/// Total order is lexicographic: by counter first, ties broken by the node's
/// deterministic host order. A correct replica's local sequence number never
/// decreases, and a leader bumps the counter every time it issues a new
/// pre-prepare.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct SeqN {
    counter: u32,
    node: Host,
}

impl SeqN {
    /// Creates a sequence number.
    pub fn new(counter: u32, node: Host) -> Self {
        Self { counter, node }
    }

    /// The counter component.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// The node that issued this sequence number.
    pub fn node(&self) -> Host {
        self.node
    }

    /// The next sequence number, issued by `node`.
    pub fn increment(&self, node: Host) -> Self {
        Self {
            counter: self.counter + 1,
            node,
        }
    }
}

impl std::fmt::Display for SeqN {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.counter, self.node)
    }
}

impl std::fmt::Debug for SeqN {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(port: u16) -> Host {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn order_is_lexicographic() {
        let low = SeqN::new(1, host(5003));
        let high = SeqN::new(2, host(5000));
        assert!(low < high, "counter dominates node order");

        let a = SeqN::new(2, host(5000));
        let b = SeqN::new(2, host(5001));
        assert!(a < b, "node order breaks counter ties");
    }

    #[test]
    fn increment_bumps_counter_and_takes_node() {
        let seq = SeqN::new(0, host(5000));
        let next = seq.increment(host(5002));
        assert_eq!(next.counter(), 1);
        assert_eq!(next.node(), host(5002));
        assert!(seq < next);
    }
}
