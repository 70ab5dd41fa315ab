//! # Error Types
//!
//! Errors raised by the shared ports and the wire codec.

use crate::entities::ChainId;
use thiserror::Error;

/// Errors related to wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Payload could not be parsed.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Payload could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Signature does not verify against the claimed guard key.
    #[error("Invalid signature")]
    InvalidSignature,
}

/// Errors reported by a Chain Adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Node or explorer unreachable; retry on the next cycle.
    #[error("Chain unavailable: {0}")]
    Unavailable(String),

    /// The chain refused the transaction.
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// Not enough spendable value to build a candidate.
    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds {
        /// Value required.
        needed: u64,
        /// Value spendable.
        available: u64,
    },

    /// Bytes could not be decoded as a transaction.
    #[error("Malformed transaction: {0}")]
    Malformed(String),

    /// No adapter registered for the chain.
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(ChainId),
}

impl ChainError {
    /// True for I/O failures that leave persisted state untouched.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors reported by a Ledger Store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Backend failure.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}
