//! ed25519 signing primitives.
//!
//! A thin adapter over `ed25519_dalek` exposing the engine-facing API, plus
//! the [`Truststore`] that resolves a message's logical key name to the
//! verification key of the replica that signed it.

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek as ed;
use ed::{Signer as _, Verifier as _};
use std::collections::HashMap;
use thiserror::Error;

/// Any failure in the sign/verify/key-lookup pipeline.
///
/// Validators treat every variant the same way: drop the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The signature does not verify against the resolved key.
    #[error("invalid signature")]
    InvalidSignature,
    /// Key bytes do not decode to a valid key.
    #[error("malformed key material")]
    MalformedKey,
    /// No verification key is registered under the carried crypto name.
    #[error("no verification key registered for `{0}`")]
    UnknownSigner(String),
}

/// ed25519 secret key.
pub struct SecretKey(ed::SigningKey);

impl SecretKey {
    /// Generates a secret key from a cryptographically-secure entropy source.
    pub fn generate() -> Self {
        Self(ed::SigningKey::generate(&mut rand::rngs::OsRng {}))
    }

    /// Derives a secret key from a 32-byte seed. Same seed, same key; this is
    /// what the deterministic simulation relies on.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(ed::SigningKey::from_bytes(seed))
    }

    /// Signs a message.
    pub fn sign(&self, msg: &[u8]) -> Signature {
        Signature(self.0.sign(msg))
    }

    /// Computes the public key for this secret key.
    pub fn public(&self) -> PublicKey {
        PublicKey(ed::VerifyingKey::from(&self.0))
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "SecretKey(..)")
    }
}

/// ed25519 public key.
#[derive(Clone)]
pub struct PublicKey(ed::VerifyingKey);

impl PublicKey {
    /// Verifies a signature of a message against this public key.
    pub fn verify(&self, msg: &[u8], sig: &Signature) -> Result<(), SignatureError> {
        self.0
            .verify(msg, &sig.0)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    /// Decodes a public key from its 32-byte encoding.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignatureError> {
        ed::VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| SignatureError::MalformedKey)
    }

    /// The 32-byte encoding of this key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write(self.0.as_bytes());
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl Eq for PublicKey {}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0.as_bytes()[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..")
    }
}

/// ed25519 signature.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(ed::Signature);

impl Signature {
    /// Decodes a signature from its 64-byte encoding.
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self(ed::Signature::from_bytes(bytes))
    }

    /// The 64-byte encoding of this signature.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }
}

impl BorshSerialize for Signature {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}

impl BorshDeserialize for Signature {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut bytes = [0u8; 64];
        reader.read_exact(&mut bytes)?;
        Ok(Self::from_bytes(&bytes))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        for byte in &bytes[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..")
    }
}

/// Maps each replica's logical key name to its verification key.
///
/// Read-only after initialization; shared by reference across the engine.
#[derive(Debug, Clone, Default)]
pub struct Truststore {
    keys: HashMap<String, PublicKey>,
}

impl Truststore {
    /// Creates an empty truststore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a verification key under a logical name.
    pub fn insert(&mut self, name: impl Into<String>, key: PublicKey) {
        self.keys.insert(name.into(), key);
    }

    /// Resolves a logical key name carried inside a message.
    pub fn lookup(&self, name: &str) -> Result<&PublicKey, SignatureError> {
        self.keys
            .get(name)
            .ok_or_else(|| SignatureError::UnknownSigner(name.to_string()))
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the truststore is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
