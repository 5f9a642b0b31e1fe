//! Core types for the Palisade replication engine.
//!
//! This crate provides the foundational types used throughout the engine:
//!
//! - **Primitives**: [`Hash`], signing keys and signatures, the [`Truststore`]
//! - **Identity**: [`Host`], the [`SeqN`] sequence identifier
//! - **Membership**: [`View`] with deterministic leader selection
//! - **Agreement**: [`SlotKey`], the identity of one consensus slot
//! - **Ingress**: [`ProposeRequest`], the application-facing downcall
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. Every type
//! that crosses the wire derives a canonical borsh encoding, which is what
//! lets every replica recompute identical signing preimages and digests.

mod crypto;
mod hash;
mod host;
mod request;
mod seqn;
mod slot;
mod view;

pub use crypto::{PublicKey, SecretKey, Signature, SignatureError, Truststore};
pub use hash::Hash;
pub use host::{Host, HostParseError};
pub use request::ProposeRequest;
pub use seqn::SeqN;
pub use slot::SlotKey;
pub use view::View;
