//! # Shared Crypto - Guard Identity Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Guard identity, control-message and vote signatures |
//! | `hashing` | SHA-256 | Transaction ids, commitments, domain-separated digests |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency when signing
//! - Secret seeds are zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{sha256, sha256_many, tagged_hash, Hash};
pub use signatures::{GuardKeyPair, GuardPublicKey, GuardSignature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
