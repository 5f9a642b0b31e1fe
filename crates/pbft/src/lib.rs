//! PBFT agreement state machine.
//!
//! This crate provides a synchronous three-phase PBFT implementation
//! that can be used for both simulation and production.
//!
//! # Architecture
//!
//! The state machine processes events synchronously:
//!
//! - `Event::Propose` → If leader, open a slot and broadcast a pre-prepare
//! - `Event::PrePrepareReceived` → Validate, store payload, broadcast prepare
//! - `Event::PrepareReceived` → Count prepares, broadcast commit at `2f+1`
//! - `Event::CommitReceived` → Count commits, deliver the payload at `f+1`
//! - `Event::LeaderTimer` → Suspect the leader after sustained silence
//!
//! All I/O is performed by the runner via returned `Action`s.
//!
//! # Terminology
//!
//! - **Slot**: A position in the agreed total order, identified by a
//!   `SlotKey` of `(opsHash, seqN, view)`.
//!
//! - **View**: An epoch with a deterministic leader. View-change *detection*
//!   lives here (the leader timer); the recovery subprotocol does not.
//!
//! - **Operation**: The opaque payload under agreement. It travels the wire
//!   once, inside the pre-prepare; prepares and commits reference it by
//!   content digest through the `OpsMap`.
//!
//! # Safety
//!
//! - **Quorum intersection**: With `n = 3f+1` members, any two prepare
//!   quorums of `2f+1` overlap in an honest replica, so conflicting slots
//!   cannot both gather quorum.
//!
//! - **No equivocation acceptance**: A replica remembers the operation hash
//!   it accepted for each `(seqN, view)` and rejects a second pre-prepare
//!   for the same pair with a different hash.
//!
//! - **Single-shot thresholds**: Phase counters are sender-deduplicated and
//!   thresholds fire on the exact `== 2f+1` / `== f+1` transition, so each
//!   slot broadcasts one commit and delivers one notification.

mod config;
mod ops_map;
mod slots;
mod state;

pub use config::PbftConfig;
pub use ops_map::{OpsKey, OpsMap, OpsMapError};
pub use slots::{SlotEntry, SlotLedger, SlotLedgerError};
pub use state::PbftState;
