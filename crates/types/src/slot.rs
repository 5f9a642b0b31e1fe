//! Consensus slot identity.

use crate::{Hash, SeqN};
use borsh::{BorshDeserialize, BorshSerialize};

/// Identifies one consensus slot: the operation being ordered, the sequence
/// number it was proposed at, and the view it was proposed in.
///
/// All three phase messages carry the slot key; the slot ledger indexes its
/// entries by [`SlotKey::digest`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct SlotKey {
    /// Content digest of the operation under agreement.
    pub ops_hash: Hash,
    /// Sequence number the leader stamped into the pre-prepare.
    pub seq: SeqN,
    /// View number the slot belongs to.
    pub view: u32,
}

impl SlotKey {
    /// Creates a slot key.
    pub fn new(ops_hash: Hash, seq: SeqN, view: u32) -> Self {
        Self {
            ops_hash,
            seq,
            view,
        }
    }

    /// The digest this slot is ledgered under.
    pub fn digest(&self) -> Hash {
        let bytes = borsh::to_vec(self).expect("slot key serializes to memory");
        Hash::digest(&bytes)
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(op {:?}, seq {}, view {})", self.ops_hash, self.seq, self.view)
    }
}

impl std::fmt::Debug for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}
