//! # Ledger Store Port
//!
//! Persisted events and transactions. Persisted state, not in-memory state,
//! is authoritative across restarts: the lifecycle processor drives
//! exclusively from what this port returns.

use crate::entities::{
    ChainId, ChainTransaction, EventId, EventRecord, EventStatus, TransactionType, TxId,
};
use crate::errors::{LedgerError, MessageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

/// Lifecycle status of a persisted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionStatus {
    /// Agreed by a quorum, waiting for signing.
    Approved,
    /// Handed to the signing session manager.
    InSign,
    /// Threshold signature attached.
    Signed,
    /// Signing timed out.
    SignFailed,
    /// Submitted to the chain.
    Sent,
    /// Inputs consumed elsewhere; the event is rolled back.
    Invalid,
    /// Confirmed at the required depth.
    Completed,
}

impl TransactionStatus {
    /// Terminal per record.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Invalid | Self::Completed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Approved => "approved",
            Self::InSign => "in-sign",
            Self::Signed => "signed",
            Self::SignFailed => "sign-failed",
            Self::Sent => "sent",
            Self::Invalid => "invalid",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// A transaction record as kept by the Ledger Store.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTransaction {
    /// Transaction id.
    pub tx_id: TxId,
    /// Owning event.
    pub event_id: EventId,
    /// Chain the transaction is paid on.
    pub chain: ChainId,
    /// Purpose.
    pub tx_type: TransactionType,
    /// Current lifecycle status.
    pub status: TransactionStatus,
    /// Canonical JSON of the agreed transaction.
    pub tx_json: String,
    /// Signed bytes, once the signing session resolved.
    #[serde_as(as = "Option<Hex>")]
    #[serde(default)]
    pub signed_bytes: Option<Vec<u8>>,
    /// Last time the chain was polled for this transaction (unix ms).
    pub last_check: u64,
    /// Last status change (unix ms).
    pub last_status_update: u64,
    /// Signatures required to authorize the transaction.
    pub required_sign: usize,
}

impl PersistedTransaction {
    /// Record for a freshly agreed transaction.
    pub fn new_approved(
        tx: &ChainTransaction,
        required_sign: usize,
        now: u64,
    ) -> Result<Self, MessageError> {
        Ok(Self {
            tx_id: tx.tx_id.clone(),
            event_id: tx.event_id.clone(),
            chain: tx.chain.clone(),
            tx_type: tx.tx_type,
            status: TransactionStatus::Approved,
            tx_json: tx.to_json()?,
            signed_bytes: None,
            last_check: now,
            last_status_update: now,
            required_sign,
        })
    }

    /// Decode the stored transaction.
    pub fn chain_transaction(&self) -> Result<ChainTransaction, MessageError> {
        ChainTransaction::from_json(&self.tx_json)
    }
}

/// Storage for events and transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a verified event.
    async fn insert_event(&self, record: EventRecord) -> Result<(), LedgerError>;

    /// Lookup an event.
    async fn event_by_id(&self, id: &EventId) -> Result<Option<EventRecord>, LedgerError>;

    /// All events in any of `statuses`.
    async fn events_by_status(
        &self,
        statuses: &[EventStatus],
    ) -> Result<Vec<EventRecord>, LedgerError>;

    /// Move an event to `status`.
    async fn set_event_status(&self, id: &EventId, status: EventStatus)
        -> Result<(), LedgerError>;

    /// Insert a transaction. Fails with `Duplicate` if the id exists.
    async fn insert_transaction(&self, tx: PersistedTransaction) -> Result<(), LedgerError>;

    /// Replace an existing transaction record.
    async fn update_transaction(&self, tx: PersistedTransaction) -> Result<(), LedgerError>;

    /// Lookup a transaction.
    async fn transaction_by_id(
        &self,
        id: &TxId,
    ) -> Result<Option<PersistedTransaction>, LedgerError>;

    /// All transactions in any of `statuses`.
    async fn transactions_by_status(
        &self,
        statuses: &[TransactionStatus],
    ) -> Result<Vec<PersistedTransaction>, LedgerError>;
}
