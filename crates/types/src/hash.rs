//! Fixed-width content digest.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest as _, Sha256};

/// A 32-byte SHA-256 digest.
///
/// Used for content-addressing operations and slot keys: `Prepare` and
/// `Commit` carry only the digest of what the pre-prepare transported in
/// full.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The all-zero digest.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Hash arbitrary bytes.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Leading 8 hex chars are enough to tell digests apart in logs.
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(Hash::digest(b"block"), Hash::digest(b"block"));
        assert_ne!(Hash::digest(b"block"), Hash::digest(b"other"));
    }

    #[test]
    fn borsh_round_trip() {
        let hash = Hash::digest(b"payload");
        let bytes = borsh::to_vec(&hash).unwrap();
        assert_eq!(bytes.len(), 32);
        let decoded: Hash = borsh::from_slice(&bytes).unwrap();
        assert_eq!(decoded, hash);
    }

    #[test]
    fn display_is_full_hex() {
        assert_eq!(format!("{}", Hash::ZERO), "0".repeat(64));
    }
}
