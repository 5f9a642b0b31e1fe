//! Per-slot quorum ledger.

use palisade_types::{Hash, Host};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors from the slot ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotLedgerError {
    /// The slot was already opened.
    #[error("slot {0} already open")]
    DuplicateSlot(Hash),

    /// A phase message arrived for a slot that was never opened.
    #[error("slot {0} not open")]
    UnknownSlot(Hash),
}

/// Quorum bookkeeping for one consensus slot.
///
/// Phase counters are keyed by sender host, so a replica repeating a
/// prepare or commit cannot advance a quorum. A slot that reaches
/// `committed` is never mutated again.
#[derive(Debug, Clone, Default)]
pub struct SlotEntry {
    prepared_by: HashSet<Host>,
    committed_by: HashSet<Host>,
    /// Whether this replica broadcast its prepare for the slot.
    pub prepare_sent: bool,
    /// Whether this replica broadcast its commit for the slot.
    pub commit_sent: bool,
    /// Whether the slot reached commit quorum and was delivered.
    pub committed: bool,
}

impl SlotEntry {
    /// Number of distinct replicas seen preparing this slot.
    pub fn prepare_count(&self) -> u32 {
        self.prepared_by.len() as u32
    }

    /// Number of distinct replicas seen committing this slot.
    pub fn commit_count(&self) -> u32 {
        self.committed_by.len() as u32
    }
}

/// Ledger of open slots, keyed by the slot-key digest.
///
/// The ledger does not interpret quorum sizes; it only counts. Threshold
/// decisions belong to the state machine.
#[derive(Debug, Default)]
pub struct SlotLedger {
    slots: HashMap<Hash, SlotEntry>,
}

impl SlotLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a slot with zeroed counters.
    pub fn open(&mut self, slot: Hash) -> Result<(), SlotLedgerError> {
        if self.slots.contains_key(&slot) {
            return Err(SlotLedgerError::DuplicateSlot(slot));
        }
        self.slots.insert(slot, SlotEntry::default());
        Ok(())
    }

    /// Whether a slot is open.
    pub fn contains(&self, slot: &Hash) -> bool {
        self.slots.contains_key(slot)
    }

    /// Records a prepare from `sender` and returns the distinct-sender
    /// count. A repeated sender leaves the count unchanged.
    pub fn add_prepare(&mut self, slot: Hash, sender: Host) -> Result<u32, SlotLedgerError> {
        let entry = self
            .slots
            .get_mut(&slot)
            .ok_or(SlotLedgerError::UnknownSlot(slot))?;
        entry.prepared_by.insert(sender);
        Ok(entry.prepare_count())
    }

    /// Records a commit from `sender` and returns the distinct-sender
    /// count. A repeated sender leaves the count unchanged.
    pub fn add_commit(&mut self, slot: Hash, sender: Host) -> Result<u32, SlotLedgerError> {
        let entry = self
            .slots
            .get_mut(&slot)
            .ok_or(SlotLedgerError::UnknownSlot(slot))?;
        entry.committed_by.insert(sender);
        Ok(entry.commit_count())
    }

    /// Read access to a slot's entry.
    pub fn entry(&self, slot: &Hash) -> Option<&SlotEntry> {
        self.slots.get(slot)
    }

    /// Write access to a slot's entry, for phase flags.
    pub fn entry_mut(&mut self, slot: &Hash) -> Option<&mut SlotEntry> {
        self.slots.get_mut(slot)
    }

    /// Current `(prepares, commits)` counters of a slot, for diagnostics.
    pub fn counters(&self, slot: &Hash) -> Option<(u32, u32)> {
        self.slots
            .get(slot)
            .map(|e| (e.prepare_count(), e.commit_count()))
    }

    /// Number of open slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is open.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(port: u16) -> Host {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn open_once() {
        let mut ledger = SlotLedger::new();
        let slot = Hash::digest(b"slot");
        ledger.open(slot).unwrap();
        assert_eq!(
            ledger.open(slot),
            Err(SlotLedgerError::DuplicateSlot(slot))
        );
        assert!(ledger.contains(&slot));
    }

    #[test]
    fn phase_messages_need_an_open_slot() {
        let mut ledger = SlotLedger::new();
        let slot = Hash::digest(b"slot");
        assert_eq!(
            ledger.add_prepare(slot, host(5000)),
            Err(SlotLedgerError::UnknownSlot(slot))
        );
        assert_eq!(
            ledger.add_commit(slot, host(5000)),
            Err(SlotLedgerError::UnknownSlot(slot))
        );
    }

    #[test]
    fn counts_distinct_senders() {
        let mut ledger = SlotLedger::new();
        let slot = Hash::digest(b"slot");
        ledger.open(slot).unwrap();

        assert_eq!(ledger.add_prepare(slot, host(5000)).unwrap(), 1);
        assert_eq!(ledger.add_prepare(slot, host(5001)).unwrap(), 2);
        assert_eq!(ledger.add_prepare(slot, host(5002)).unwrap(), 3);
        assert_eq!(ledger.counters(&slot), Some((3, 0)));
    }

    #[test]
    fn repeated_sender_cannot_inflate_a_quorum() {
        let mut ledger = SlotLedger::new();
        let slot = Hash::digest(b"slot");
        ledger.open(slot).unwrap();

        assert_eq!(ledger.add_prepare(slot, host(5000)).unwrap(), 1);
        assert_eq!(ledger.add_prepare(slot, host(5000)).unwrap(), 1);
        assert_eq!(ledger.add_prepare(slot, host(5000)).unwrap(), 1);

        assert_eq!(ledger.add_commit(slot, host(5001)).unwrap(), 1);
        assert_eq!(ledger.add_commit(slot, host(5001)).unwrap(), 1);
    }

    #[test]
    fn flags_default_unset() {
        let mut ledger = SlotLedger::new();
        let slot = Hash::digest(b"slot");
        ledger.open(slot).unwrap();
        let entry = ledger.entry(&slot).unwrap();
        assert!(!entry.prepare_sent && !entry.commit_sent && !entry.committed);
    }
}
