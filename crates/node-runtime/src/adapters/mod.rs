//! # Adapters
//!
//! Port implementations that connect one subsystem to another.

pub mod signer;

pub use signer::MultiSigSigner;
