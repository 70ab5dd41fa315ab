//! Domain Layer - guard identities and transport bindings, no I/O.

pub mod bindings;
pub mod entities;
pub mod errors;

pub use bindings::{BindOutcome, PendingChallenge, TransportBindings};
pub use entities::{GuardPeer, PeerSet};
pub use errors::RegistryError;
