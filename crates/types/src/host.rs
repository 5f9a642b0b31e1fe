//! Replica identity.

use borsh::{BorshDeserialize, BorshSerialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use thiserror::Error;

/// A replica's network identity: IPv4 address plus port.
///
/// Host ordering is derived from `(octets, port)` and is therefore
/// deterministic across replicas, which is what makes the initial leader
/// well-defined and ties in `SeqN` comparison.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct Host {
    octets: [u8; 4],
    port: u16,
}

impl Host {
    /// Creates a host from an address and port.
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            octets: ip.octets(),
            port,
        }
    }

    /// The IPv4 address.
    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.octets)
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The host as a socket address, for the transport layer.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip(), self.port))
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip(), self.port)
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

/// Error parsing an `ip:port` host string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed host `{0}`, expected `ip:port`")]
pub struct HostParseError(pub String);

impl FromStr for Host {
    type Err = HostParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, port) = s.split_once(':').ok_or_else(|| HostParseError(s.into()))?;
        let ip: Ipv4Addr = ip.parse().map_err(|_| HostParseError(s.into()))?;
        let port: u16 = port.parse().map_err(|_| HostParseError(s.into()))?;
        Ok(Self::new(ip, port))
    }
}
