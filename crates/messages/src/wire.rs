//! Signed wire records for the three agreement phases.

use borsh::{BorshDeserialize, BorshSerialize};
use palisade_types::{SecretKey, Signature, SignatureError, SlotKey, Truststore};

/// One byte per record type; doubles as the wire dispatch tag and as the
/// domain separator at the front of every signing preimage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Leader's proposal, carries the payload.
    PrePrepare = 1,
    /// Backup endorsement.
    Prepare = 2,
    /// Prepare-quorum claim.
    Commit = 3,
}

impl MessageKind {
    /// The wire tag for this kind.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parses a wire tag.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageKind::PrePrepare),
            2 => Some(MessageKind::Prepare),
            3 => Some(MessageKind::Commit),
            _ => None,
        }
    }
}

fn preimage(kind: MessageKind, fields: &impl BorshSerialize) -> Vec<u8> {
    let mut bytes = vec![kind.as_byte()];
    fields
        .serialize(&mut bytes)
        .expect("signing preimage serializes to memory");
    bytes
}

/// Leader's proposal for a slot. The only record that carries the payload;
/// prepares and commits reference it by hash.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PrePrepareMessage {
    /// The slot being opened.
    pub key: SlotKey,
    /// The payload under agreement.
    pub operation: Vec<u8>,
    /// Logical name resolving the sender's verification key.
    pub crypto_name: String,
    /// Signature over the canonical encoding of the fields above.
    pub signature: Signature,
}

impl PrePrepareMessage {
    /// Builds and signs a pre-prepare.
    pub fn signed(
        key: SlotKey,
        operation: Vec<u8>,
        crypto_name: String,
        secret: &SecretKey,
    ) -> Self {
        let signature = secret.sign(&preimage(
            MessageKind::PrePrepare,
            &(&key, &operation, &crypto_name),
        ));
        Self {
            key,
            operation,
            crypto_name,
            signature,
        }
    }

    /// Verifies the signature against the key named by `crypto_name`.
    pub fn verify(&self, truststore: &Truststore) -> Result<(), SignatureError> {
        let public = truststore.lookup(&self.crypto_name)?;
        public.verify(
            &preimage(
                MessageKind::PrePrepare,
                &(&self.key, &self.operation, &self.crypto_name),
            ),
            &self.signature,
        )
    }
}

/// Backup endorsement of an open slot.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PrepareMessage {
    /// The endorsed slot.
    pub key: SlotKey,
    /// Wire-format padding, always zero.
    pub reserved: u32,
    /// Logical name resolving the sender's verification key.
    pub crypto_name: String,
    /// Signature over the canonical encoding of the fields above.
    pub signature: Signature,
}

impl PrepareMessage {
    /// Builds and signs a prepare.
    pub fn signed(key: SlotKey, crypto_name: String, secret: &SecretKey) -> Self {
        let reserved = 0u32;
        let signature = secret.sign(&preimage(
            MessageKind::Prepare,
            &(&key, reserved, &crypto_name),
        ));
        Self {
            key,
            reserved,
            crypto_name,
            signature,
        }
    }

    /// Verifies the signature against the key named by `crypto_name`.
    pub fn verify(&self, truststore: &Truststore) -> Result<(), SignatureError> {
        let public = truststore.lookup(&self.crypto_name)?;
        public.verify(
            &preimage(
                MessageKind::Prepare,
                &(&self.key, self.reserved, &self.crypto_name),
            ),
            &self.signature,
        )
    }
}

/// A replica's claim that prepare quorum was reached for a slot.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CommitMessage {
    /// The slot being committed.
    pub key: SlotKey,
    /// Wire-format padding, always zero.
    pub reserved: u32,
    /// Logical name resolving the sender's verification key.
    pub crypto_name: String,
    /// Signature over the canonical encoding of the fields above.
    pub signature: Signature,
}

impl CommitMessage {
    /// Builds and signs a commit.
    pub fn signed(key: SlotKey, crypto_name: String, secret: &SecretKey) -> Self {
        let reserved = 0u32;
        let signature = secret.sign(&preimage(
            MessageKind::Commit,
            &(&key, reserved, &crypto_name),
        ));
        Self {
            key,
            reserved,
            crypto_name,
            signature,
        }
    }

    /// Verifies the signature against the key named by `crypto_name`.
    pub fn verify(&self, truststore: &Truststore) -> Result<(), SignatureError> {
        let public = truststore.lookup(&self.crypto_name)?;
        public.verify(
            &preimage(
                MessageKind::Commit,
                &(&self.key, self.reserved, &self.crypto_name),
            ),
            &self.signature,
        )
    }
}

/// Any of the three wire records, tagged for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Leader proposal.
    PrePrepare(PrePrepareMessage),
    /// Backup endorsement.
    Prepare(PrepareMessage),
    /// Prepare-quorum claim.
    Commit(CommitMessage),
}

impl WireMessage {
    /// The record's kind tag.
    pub fn kind(&self) -> MessageKind {
        match self {
            WireMessage::PrePrepare(_) => MessageKind::PrePrepare,
            WireMessage::Prepare(_) => MessageKind::Prepare,
            WireMessage::Commit(_) => MessageKind::Commit,
        }
    }

    /// The slot key every record carries.
    pub fn key(&self) -> &SlotKey {
        match self {
            WireMessage::PrePrepare(m) => &m.key,
            WireMessage::Prepare(m) => &m.key,
            WireMessage::Commit(m) => &m.key,
        }
    }

    /// Human-readable name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            WireMessage::PrePrepare(_) => "PrePrepare",
            WireMessage::Prepare(_) => "Prepare",
            WireMessage::Commit(_) => "Commit",
        }
    }
}
