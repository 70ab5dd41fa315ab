//! # Ports Layer
//!
//! - **Driven Port (Outbound):** [`MultiSigProver`], the discrete-log
//!   signature primitive. Calls are CPU-bound and run off the async
//!   executor under a timeout.
//!
//! The transport ([`Dialer`](shared_bus::Dialer)) and identity
//! ([`GuardDirectory`](cg_01_peer_registry::GuardDirectory)) ports come
//! from `shared-bus` and `cg-01-peer-registry`.

pub mod outbound;

pub use outbound::{MultiSigProver, SignRequest};
