//! Signing port.

use crate::domain::LifecycleError;
use async_trait::async_trait;
use shared_types::{ChainTransaction, SignedTransaction};

/// Produces the threshold signature for an agreed transaction.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Run (or rejoin) the signing round for `tx` and wait for its outcome.
    async fn sign(
        &self,
        tx: &ChainTransaction,
        required_signers: usize,
    ) -> Result<SignedTransaction, LifecycleError>;
}
