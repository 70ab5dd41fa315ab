//! # Transaction Lifecycle Subsystem
//!
//! **Subsystem ID:** cg-04
//!
//! Takes every agreed transaction from `approved` to a terminal status. Each
//! poll reads persisted records only, so a restarted guard resumes where the
//! ledger says it was: signing, submission, confirmation tracking,
//! resubmission of dropped transactions and rollback of events whose inputs
//! were spent elsewhere.
//!
//! ## Architecture
//!
//! - **Domain Layer:** status transition table, [`LifecycleConfig`]
//! - **Ports Layer:** [`TransactionSigner`]
//! - **Service Layer:** [`LifecycleService`]
//! - **Adapters Layer:** [`InMemoryLedger`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryLedger;
pub use domain::{is_allowed, transition, LifecycleConfig, LifecycleError};
pub use ports::TransactionSigner;
pub use service::{CycleSummary, LifecycleDependencies, LifecycleService};
