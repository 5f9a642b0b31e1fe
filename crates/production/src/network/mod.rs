//! Point-to-point TCP transport.

mod adapter;

pub use adapter::{TcpAdapter, TransportError};
