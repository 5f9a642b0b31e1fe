//! Content-addressed operation store.

use borsh::{BorshDeserialize, BorshSerialize};
use palisade_types::Hash;
use std::collections::HashMap;
use thiserror::Error;

/// Identifies an operation at the ingress path: the client timestamp plus
/// the digest of the request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct OpsKey {
    /// Client-assigned tag of the request.
    pub timestamp: u64,
    /// Digest of the request payload.
    pub request_hash: Hash,
}

impl OpsKey {
    /// Creates an ops key.
    pub fn new(timestamp: u64, request_hash: Hash) -> Self {
        Self {
            timestamp,
            request_hash,
        }
    }

    /// The content-addressing digest this operation is stored under.
    pub fn digest(&self) -> Hash {
        let bytes = borsh::to_vec(self).expect("ops key serializes to memory");
        Hash::digest(&bytes)
    }
}

/// Errors from the operation store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpsMapError {
    /// A different payload is already stored under this digest.
    #[error("operation {0} already stored")]
    DuplicateOp(Hash),

    /// No payload is stored under this digest.
    #[error("operation {0} not found")]
    UnknownOp(Hash),
}

/// Append-only map from operation digest to payload bytes.
///
/// Content-addressing is what lets a pre-prepare carry the payload once
/// while prepares and commits carry only the digest. The map lives for the
/// lifetime of the engine; decided slots are not garbage collected.
#[derive(Debug, Default)]
pub struct OpsMap {
    ops: HashMap<Hash, Vec<u8>>,
}

impl OpsMap {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a payload under its digest.
    ///
    /// Idempotent for an identical payload; a second insertion under the
    /// same digest with different bytes is a replay and is rejected.
    pub fn insert(&mut self, hash: Hash, payload: Vec<u8>) -> Result<(), OpsMapError> {
        match self.ops.get(&hash) {
            None => {
                self.ops.insert(hash, payload);
                Ok(())
            }
            Some(existing) if *existing == payload => Ok(()),
            Some(_) => Err(OpsMapError::DuplicateOp(hash)),
        }
    }

    /// Retrieves a payload by digest.
    pub fn get(&self, hash: &Hash) -> Result<&[u8], OpsMapError> {
        self.ops
            .get(hash)
            .map(Vec::as_slice)
            .ok_or(OpsMapError::UnknownOp(*hash))
    }

    /// Whether a payload is stored under this digest.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.ops.contains_key(hash)
    }

    /// Number of stored operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut ops = OpsMap::new();
        let hash = Hash::digest(b"block");
        ops.insert(hash, b"block".to_vec()).unwrap();
        assert_eq!(ops.get(&hash).unwrap(), b"block");
        assert!(ops.contains(&hash));
    }

    #[test]
    fn identical_reinsert_is_idempotent() {
        let mut ops = OpsMap::new();
        let hash = Hash::digest(b"block");
        ops.insert(hash, b"block".to_vec()).unwrap();
        assert!(ops.insert(hash, b"block".to_vec()).is_ok());
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn conflicting_reinsert_is_rejected() {
        let mut ops = OpsMap::new();
        let hash = Hash::digest(b"block");
        ops.insert(hash, b"block".to_vec()).unwrap();
        assert_eq!(
            ops.insert(hash, b"other".to_vec()),
            Err(OpsMapError::DuplicateOp(hash))
        );
        assert_eq!(ops.get(&hash).unwrap(), b"block");
    }

    #[test]
    fn unknown_lookup_fails() {
        let ops = OpsMap::new();
        let hash = Hash::digest(b"missing");
        assert_eq!(ops.get(&hash), Err(OpsMapError::UnknownOp(hash)));
    }

    #[test]
    fn ops_key_digest_separates_timestamp_and_payload() {
        let request = Hash::digest(b"block");
        let a = OpsKey::new(1, request).digest();
        let b = OpsKey::new(2, request).digest();
        let c = OpsKey::new(1, Hash::digest(b"other")).digest();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, OpsKey::new(1, request).digest());
    }
}
