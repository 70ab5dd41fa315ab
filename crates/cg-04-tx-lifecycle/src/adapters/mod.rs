//! Adapters Layer - in-memory Ledger Store.

pub mod memory_ledger;

pub use memory_ledger::InMemoryLedger;
