//! Lifecycle errors.

use shared_types::{ChainError, LedgerError, MessageError, TransactionStatus, TxId};
use thiserror::Error;

/// Lifecycle processor errors. Each is isolated to the record it was
/// raised for.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The transition is not in the lifecycle table.
    #[error("Illegal transition for {tx_id}: {from} -> {to}")]
    InvalidTransition {
        /// Transaction.
        tx_id: TxId,
        /// Current status.
        from: TransactionStatus,
        /// Requested status.
        to: TransactionStatus,
    },

    /// No such transaction in the ledger.
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(TxId),

    /// The signing round failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Chain adapter failure.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Stored transaction could not be decoded.
    #[error(transparent)]
    Message(#[from] MessageError),
}
