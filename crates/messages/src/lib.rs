//! Network messages for the replication protocol.
//!
//! Three authenticated records drive the agreement phases:
//!
//! - [`PrePrepareMessage`]: opens a slot and transports the payload once
//! - [`PrepareMessage`]: a backup's endorsement of the slot
//! - [`CommitMessage`]: a replica's claim that prepare quorum was reached
//!
//! All three share the shell `{ key, crypto_name, signature }`. The
//! signature covers a canonical borsh preimage of every other field,
//! prefixed by the record's kind byte, so any replica recomputes the exact
//! same bytes when verifying.

mod codec;
mod wire;

pub use codec::{decode_message, encode_message, CodecError, WIRE_VERSION};
pub use wire::{CommitMessage, MessageKind, PrePrepareMessage, PrepareMessage, WireMessage};
