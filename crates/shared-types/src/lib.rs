//! # Shared Types Crate
//!
//! Domain entities, wire envelopes and outbound ports shared by every guard
//! subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: identifiers, events and persisted
//!   transactions are defined once here.
//! - **Signed Envelopes**: every control message a guard emits is wrapped in
//!   [`Signed<T>`] carrying the claimed guard index and an Ed25519 signature
//!   over the canonical payload.
//! - **Ports, not implementations**: the Chain Adapter and Ledger Store are
//!   traits; the in-tree [`SimulatedChain`] exists for devnet and tests.

pub mod chain;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ipc;
pub mod ledger;
pub mod simulated_chain;
pub mod time;

pub use chain::{ChainAdapter, ChainAdapters};
pub use entities::*;
pub use envelope::{GuardMessage, MessagePayload, Signed};
pub use errors::*;
pub use ipc::*;
pub use ledger::{LedgerStore, PersistedTransaction, TransactionStatus};
pub use simulated_chain::SimulatedChain;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};

pub use shared_crypto::{GuardKeyPair, GuardPublicKey, GuardSignature};
