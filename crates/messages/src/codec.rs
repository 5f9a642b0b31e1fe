//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! ```text
//! [version: u8][kind: u8][payload: borsh-encoded record]
//! ```
//!
//! - Version is currently `1`
//! - Kind is the [`MessageKind`] byte of the record
//! - Payload is the borsh encoding of the record struct
//!
//! Kind-byte dispatch keeps the payload itself free of type information,
//! mirroring the per-type serializer registration of the transport layer.

use crate::wire::{CommitMessage, MessageKind, PrePrepareMessage, PrepareMessage, WireMessage};
use borsh::BorshSerialize;
use thiserror::Error;

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame declared a version this build does not speak.
    #[error("unknown wire version: {0}")]
    UnknownVersion(u8),

    /// Frame declared an unassigned message kind.
    #[error("unknown message kind: {0}")]
    UnknownKind(u8),

    /// Frame is shorter than the two-byte header.
    #[error("message too short")]
    MessageTooShort,

    /// Payload bytes did not decode as the declared record.
    #[error("borsh decode error: {0}")]
    Decode(String),
}

/// Encode an outbound message to wire format.
pub fn encode_message(message: &WireMessage) -> Vec<u8> {
    let mut bytes = vec![WIRE_VERSION, message.kind().as_byte()];
    let result = match message {
        WireMessage::PrePrepare(m) => m.serialize(&mut bytes),
        WireMessage::Prepare(m) => m.serialize(&mut bytes),
        WireMessage::Commit(m) => m.serialize(&mut bytes),
    };
    result.expect("wire record serializes to memory");
    bytes
}

/// Decode a message from wire format.
pub fn decode_message(data: &[u8]) -> Result<WireMessage, CodecError> {
    if data.len() < 2 {
        return Err(CodecError::MessageTooShort);
    }

    let version = data[0];
    if version != WIRE_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }

    let kind = MessageKind::from_byte(data[1]).ok_or(CodecError::UnknownKind(data[1]))?;
    let payload = &data[2..];

    let decode_err = |e: std::io::Error| CodecError::Decode(e.to_string());
    match kind {
        MessageKind::PrePrepare => {
            let message: PrePrepareMessage = borsh::from_slice(payload).map_err(decode_err)?;
            Ok(WireMessage::PrePrepare(message))
        }
        MessageKind::Prepare => {
            let message: PrepareMessage = borsh::from_slice(payload).map_err(decode_err)?;
            Ok(WireMessage::Prepare(message))
        }
        MessageKind::Commit => {
            let message: CommitMessage = borsh::from_slice(payload).map_err(decode_err)?;
            Ok(WireMessage::Commit(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_types::{Hash, Host, SecretKey, SeqN, SlotKey, Truststore};

    fn slot_key() -> SlotKey {
        let node: Host = "127.0.0.1:5000".parse().unwrap();
        SlotKey::new(Hash::digest(b"op"), SeqN::new(1, node), 1)
    }

    fn secret() -> SecretKey {
        SecretKey::from_seed(&[9u8; 32])
    }

    fn truststore() -> Truststore {
        let mut store = Truststore::new();
        store.insert("replica-0", secret().public());
        store
    }

    #[test]
    fn round_trip_preserves_records_and_signatures() {
        let store = truststore();
        let messages = [
            WireMessage::PrePrepare(PrePrepareMessage::signed(
                slot_key(),
                b"op".to_vec(),
                "replica-0".into(),
                &secret(),
            )),
            WireMessage::Prepare(PrepareMessage::signed(
                slot_key(),
                "replica-0".into(),
                &secret(),
            )),
            WireMessage::Commit(CommitMessage::signed(
                slot_key(),
                "replica-0".into(),
                &secret(),
            )),
        ];

        for message in messages {
            let decoded = decode_message(&encode_message(&message)).unwrap();
            assert_eq!(decoded, message);
            let verified = match &decoded {
                WireMessage::PrePrepare(m) => m.verify(&store),
                WireMessage::Prepare(m) => m.verify(&store),
                WireMessage::Commit(m) => m.verify(&store),
            };
            assert!(verified.is_ok(), "signature must survive the round trip");
        }
    }

    #[test]
    fn rejects_unknown_version() {
        let message = WireMessage::Prepare(PrepareMessage::signed(
            slot_key(),
            "replica-0".into(),
            &secret(),
        ));
        let mut bytes = encode_message(&message);
        bytes[0] = 7;
        assert!(matches!(
            decode_message(&bytes),
            Err(CodecError::UnknownVersion(7))
        ));
    }

    #[test]
    fn rejects_unknown_kind() {
        let message = WireMessage::Prepare(PrepareMessage::signed(
            slot_key(),
            "replica-0".into(),
            &secret(),
        ));
        let mut bytes = encode_message(&message);
        bytes[1] = 0;
        assert!(matches!(
            decode_message(&bytes),
            Err(CodecError::UnknownKind(0))
        ));
    }

    #[test]
    fn rejects_truncated_frames() {
        assert!(matches!(
            decode_message(&[WIRE_VERSION]),
            Err(CodecError::MessageTooShort)
        ));
        let message = WireMessage::Commit(CommitMessage::signed(
            slot_key(),
            "replica-0".into(),
            &secret(),
        ));
        let bytes = encode_message(&message);
        assert!(matches!(
            decode_message(&bytes[..bytes.len() - 10]),
            Err(CodecError::Decode(_))
        ));
    }
}
