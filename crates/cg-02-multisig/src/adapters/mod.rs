//! # Adapters Layer
//!
//! - [`MultiSigHandler`]: routes `commitment` and `sign` messages from the
//!   multi-sig channel into the service.
//! - [`DevProver`]: hash-based prover for devnet and tests.

pub mod dev_prover;
pub mod handler;

pub use dev_prover::DevProver;
pub use handler::MultiSigHandler;
