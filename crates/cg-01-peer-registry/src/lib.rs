//! # Peer Registry Subsystem
//!
//! **Subsystem ID:** cg-01
//!
//! Ordered list of guard identities `{index, public key}` and the handshake
//! that binds a transport identity to each logical guard index.
//!
//! ## Architecture
//!
//! - **Domain Layer:** static [`PeerSet`] plus the mutable
//!   [`TransportBindings`] table and pending challenges
//! - **Ports Layer:** [`GuardDirectory`], consumed by signing and agreement
//! - **Service Layer:** [`PeerRegistry`], the handshake state machine
//! - **Adapters Layer:** [`HandshakeHandler`] for the handshake channel
//!
//! ## Security
//!
//! Every guard control message carries `{guardIndex, signature}`. It is
//! accepted only if the signature verifies against the claimed index's key
//! over the canonical payload AND the transport sender equals the identity
//! bound to (or, during the handshake, claimed by) that index. Anything else
//! is dropped without a state change.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::HandshakeHandler;
pub use domain::{BindOutcome, GuardPeer, PeerSet, RegistryError, TransportBindings};
pub use ports::GuardDirectory;
pub use service::PeerRegistry;
