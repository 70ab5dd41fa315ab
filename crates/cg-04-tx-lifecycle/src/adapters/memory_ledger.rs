//! In-memory Ledger Store for devnet and tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    EventId, EventRecord, EventStatus, LedgerError, LedgerStore, PersistedTransaction,
    TransactionStatus, TxId,
};
use std::collections::BTreeMap;

/// Ledger Store over ordered maps. Queries return records in id order.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    events: RwLock<BTreeMap<EventId, EventRecord>>,
    transactions: RwLock<BTreeMap<TxId, PersistedTransaction>>,
}

impl InMemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transaction recorded for `event_id`.
    pub fn transactions_for_event(&self, event_id: &EventId) -> Vec<PersistedTransaction> {
        self.transactions
            .read()
            .values()
            .filter(|t| t.event_id == *event_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn insert_event(&self, record: EventRecord) -> Result<(), LedgerError> {
        let mut events = self.events.write();
        if events.contains_key(&record.event.id) {
            return Err(LedgerError::Duplicate(record.event.id.to_string()));
        }
        events.insert(record.event.id.clone(), record);
        Ok(())
    }

    async fn event_by_id(&self, id: &EventId) -> Result<Option<EventRecord>, LedgerError> {
        Ok(self.events.read().get(id).cloned())
    }

    async fn events_by_status(
        &self,
        statuses: &[EventStatus],
    ) -> Result<Vec<EventRecord>, LedgerError> {
        Ok(self
            .events
            .read()
            .values()
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect())
    }

    async fn set_event_status(&self, id: &EventId, status: EventStatus) -> Result<(), LedgerError> {
        let mut events = self.events.write();
        let record = events
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        record.status = status;
        Ok(())
    }

    async fn insert_transaction(&self, tx: PersistedTransaction) -> Result<(), LedgerError> {
        let mut transactions = self.transactions.write();
        if transactions.contains_key(&tx.tx_id) {
            return Err(LedgerError::Duplicate(tx.tx_id.to_string()));
        }
        transactions.insert(tx.tx_id.clone(), tx);
        Ok(())
    }

    async fn update_transaction(&self, tx: PersistedTransaction) -> Result<(), LedgerError> {
        let mut transactions = self.transactions.write();
        let slot = transactions
            .get_mut(&tx.tx_id)
            .ok_or_else(|| LedgerError::NotFound(tx.tx_id.to_string()))?;
        *slot = tx;
        Ok(())
    }

    async fn transaction_by_id(
        &self,
        id: &TxId,
    ) -> Result<Option<PersistedTransaction>, LedgerError> {
        Ok(self.transactions.read().get(id).cloned())
    }

    async fn transactions_by_status(
        &self,
        statuses: &[TransactionStatus],
    ) -> Result<Vec<PersistedTransaction>, LedgerError> {
        Ok(self
            .transactions
            .read()
            .values()
            .filter(|t| statuses.contains(&t.status))
            .cloned()
            .collect())
    }
}
