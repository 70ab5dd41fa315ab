//! # Chain Adapter Port
//!
//! Chain-specific transaction construction, validation and submission.
//! Box selection and fee logic live behind this trait; the guard core only
//! moves serialized transactions around.

use crate::entities::{ChainId, ChainTransaction, EventTrigger, TransactionType, TxId};
use crate::errors::ChainError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Adapter to one chain.
///
/// `build_candidate_transaction` must be deterministic: identical event and
/// chain state yield byte-identical candidates on every guard.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Chain served by this adapter.
    fn chain(&self) -> &ChainId;

    /// Build the payment or reward transaction for `event`.
    async fn build_candidate_transaction(
        &self,
        event: &EventTrigger,
        tx_type: TransactionType,
    ) -> Result<ChainTransaction, ChainError>;

    /// Independently check that `tx` correctly reflects `event`.
    async fn verify_candidate_against_event(
        &self,
        tx: &ChainTransaction,
        event: &EventTrigger,
    ) -> Result<bool, ChainError>;

    /// Broadcast the signed transaction. Resubmitting a known transaction
    /// succeeds.
    async fn submit(&self, tx: &ChainTransaction, signed: &[u8]) -> Result<TxId, ChainError>;

    /// `Some(0)` when pending in the mempool, `Some(n)` once mined, `None`
    /// when the chain does not know the transaction.
    async fn get_confirmation_depth(&self, tx_id: &TxId) -> Result<Option<u64>, ChainError>;

    /// True if every input of `tx` is still unspent.
    async fn are_inputs_still_valid(&self, tx: &ChainTransaction) -> Result<bool, ChainError>;

    /// Decode a serialized candidate and check it is well formed for this chain.
    fn deserialize(&self, bytes: &[u8]) -> Result<ChainTransaction, ChainError>;

    /// Depth at which a transaction counts as final.
    fn required_confirmations(&self) -> u64;
}

/// Registry of adapters keyed by chain.
#[derive(Clone, Default)]
pub struct ChainAdapters {
    adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl ChainAdapters {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own chain id.
    pub fn with(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.adapters.insert(adapter.chain().clone(), adapter);
        self
    }

    /// Adapter for `chain`.
    pub fn get(&self, chain: &ChainId) -> Result<Arc<dyn ChainAdapter>, ChainError> {
        self.adapters
            .get(chain)
            .cloned()
            .ok_or_else(|| ChainError::UnsupportedChain(chain.clone()))
    }

    /// Registered chains.
    pub fn chains(&self) -> impl Iterator<Item = &ChainId> {
        self.adapters.keys()
    }
}

impl std::fmt::Debug for ChainAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainAdapters")
            .field("chains", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated_chain::SimulatedChain;

    #[test]
    fn test_unknown_chain_is_unsupported() {
        let adapters = ChainAdapters::new().with(Arc::new(SimulatedChain::new("ergo", 2)));
        assert!(adapters.get(&ChainId::from("ergo")).is_ok());
        assert!(matches!(
            adapters.get(&ChainId::from("cardano")),
            Err(ChainError::UnsupportedChain(_))
        ));
    }
}
