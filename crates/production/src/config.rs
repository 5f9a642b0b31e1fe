//! Replica configuration.
//!
//! Loaded from a TOML file whose keys follow the deployment properties:
//!
//! ```toml
//! address = "127.0.0.1"
//! base_port = 5000
//! initial_membership = "127.0.0.1:5000,127.0.0.1:5001,127.0.0.1:5002,127.0.0.1:5003"
//! reconnect_time = 1000
//! leader_timeout = 3000
//! crypto_name = "replica-0"
//! secret_key_path = "keys/replica-0.key"
//!
//! [truststore]
//! replica-0 = "keys/replica-0.pub"
//! replica-1 = "keys/replica-1.pub"
//! replica-2 = "keys/replica-2.pub"
//! replica-3 = "keys/replica-3.pub"
//! ```
//!
//! The membership order defines the initial view; member 0 is the initial
//! leader. Key files hold hex-encoded 32-byte material (signing seed or
//! verification key). Any malformed value here is fatal at init.

use palisade_pbft::PbftConfig;
use palisade_types::{Host, PublicKey, SecretKey, Truststore};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

fn default_reconnect_time() -> u64 {
    1000
}

fn default_leader_timeout() -> u64 {
    3000
}

/// Fatal configuration errors. The process exits on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config or key file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Config file is not valid TOML.
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// `address` is not an IPv4 address.
    #[error("malformed address `{0}`")]
    MalformedAddress(String),

    /// `initial_membership` is empty or contains a malformed entry.
    #[error("malformed membership `{0}`")]
    MalformedMembership(String),

    /// A key file does not hold hex-encoded 32-byte material.
    #[error("malformed key material in {0}")]
    MalformedKey(PathBuf),
}

/// Top-level replica configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaConfig {
    /// Local bind IP.
    pub address: String,

    /// Local TCP port.
    pub base_port: u16,

    /// Comma-separated `ip:port` list; order defines the initial view.
    pub initial_membership: String,

    /// Milliseconds between reconnect attempts.
    #[serde(default = "default_reconnect_time")]
    pub reconnect_time: u64,

    /// Milliseconds of leader silence tolerated.
    #[serde(default = "default_leader_timeout")]
    pub leader_timeout: u64,

    /// Logical name of this replica's key material.
    pub crypto_name: String,

    /// Path to the hex-encoded 32-byte signing seed.
    pub secret_key_path: PathBuf,

    /// Logical name → path of each member's hex-encoded verification key.
    #[serde(default)]
    pub truststore: HashMap<String, PathBuf>,
}

impl ReplicaConfig {
    /// Loads and parses the configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// This replica's host identity.
    pub fn local_host(&self) -> Result<Host, ConfigError> {
        let ip: Ipv4Addr = self
            .address
            .parse()
            .map_err(|_| ConfigError::MalformedAddress(self.address.clone()))?;
        Ok(Host::new(ip, self.base_port))
    }

    /// The ordered initial membership.
    pub fn membership(&self) -> Result<Vec<Host>, ConfigError> {
        let members: Result<Vec<Host>, _> = self
            .initial_membership
            .split(',')
            .map(|entry| entry.trim().parse::<Host>())
            .collect();
        let members =
            members.map_err(|_| ConfigError::MalformedMembership(self.initial_membership.clone()))?;
        if members.is_empty() {
            return Err(ConfigError::MalformedMembership(
                self.initial_membership.clone(),
            ));
        }
        Ok(members)
    }

    /// Engine timing knobs derived from the property values.
    pub fn pbft_config(&self) -> PbftConfig {
        PbftConfig {
            leader_timeout: Duration::from_millis(self.leader_timeout),
            reconnect_delay: Duration::from_millis(self.reconnect_time),
        }
    }

    /// Loads the signing key from `secret_key_path`.
    pub fn load_secret_key(&self) -> Result<SecretKey, ConfigError> {
        let seed = read_key_file(&self.secret_key_path)?;
        Ok(SecretKey::from_seed(&seed))
    }

    /// Loads every verification key named in `[truststore]`.
    pub fn load_truststore(&self) -> Result<Truststore, ConfigError> {
        let mut store = Truststore::new();
        for (name, path) in &self.truststore {
            let bytes = read_key_file(path)?;
            let key = PublicKey::from_bytes(&bytes)
                .map_err(|_| ConfigError::MalformedKey(path.clone()))?;
            store.insert(name.clone(), key);
        }
        Ok(store)
    }
}

fn read_key_file(path: &Path) -> Result<[u8; 32], ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_hex_32(raw.trim()).ok_or_else(|| ConfigError::MalformedKey(path.to_path_buf()))
}

fn decode_hex_32(hex: &str) -> Option<[u8; 32]> {
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }
    let mut bytes = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let chunk = std::str::from_utf8(chunk).ok()?;
        bytes[i] = u8::from_str_radix(chunk, 16).ok()?;
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        address = "127.0.0.1"
        base_port = 5000
        initial_membership = "127.0.0.1:5000,127.0.0.1:5001,127.0.0.1:5002,127.0.0.1:5003"
        reconnect_time = 1000
        leader_timeout = 3000
        crypto_name = "replica-0"
        secret_key_path = "keys/replica-0.key"

        [truststore]
        replica-0 = "keys/replica-0.pub"
    "#;

    #[test]
    fn parses_property_keys() {
        let config: ReplicaConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.local_host().unwrap().to_string(), "127.0.0.1:5000");
        let members = config.membership().unwrap();
        assert_eq!(members.len(), 4);
        assert_eq!(members[0], config.local_host().unwrap());
        assert_eq!(
            config.pbft_config().leader_timeout,
            Duration::from_millis(3000)
        );
        assert_eq!(config.crypto_name, "replica-0");
    }

    #[test]
    fn defaults_for_optional_timing_keys() {
        let minimal = r#"
            address = "127.0.0.1"
            base_port = 5000
            initial_membership = "127.0.0.1:5000"
            crypto_name = "replica-0"
            secret_key_path = "keys/replica-0.key"
        "#;
        let config: ReplicaConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.reconnect_time, 1000);
        assert_eq!(config.leader_timeout, 3000);
    }

    #[test]
    fn rejects_malformed_membership() {
        let config: ReplicaConfig = toml::from_str(SAMPLE).unwrap();
        let broken = ReplicaConfig {
            initial_membership: "127.0.0.1:5000,not-a-host".into(),
            ..config
        };
        assert!(matches!(
            broken.membership(),
            Err(ConfigError::MalformedMembership(_))
        ));
    }

    #[test]
    fn rejects_malformed_address() {
        let config: ReplicaConfig = toml::from_str(SAMPLE).unwrap();
        let broken = ReplicaConfig {
            address: "::1".into(),
            ..config
        };
        assert!(matches!(
            broken.local_host(),
            Err(ConfigError::MalformedAddress(_))
        ));
    }

    #[test]
    fn hex_decoding() {
        assert_eq!(decode_hex_32(&"00".repeat(32)), Some([0u8; 32]));
        assert_eq!(decode_hex_32(&"ff".repeat(32)), Some([0xffu8; 32]));
        assert_eq!(decode_hex_32("f00"), None);
        assert_eq!(decode_hex_32(&"zz".repeat(32)), None);
    }
}
