//! Lifecycle signing port over the signing session manager.

use async_trait::async_trait;
use cg_02_multisig::{MultiSigService, SigningError};
use cg_04_tx_lifecycle::{LifecycleError, TransactionSigner};
use shared_types::{ChainTransaction, SignedTransaction};
use std::sync::Arc;

/// Runs the threshold signing round for the lifecycle processor.
pub struct MultiSigSigner {
    service: Arc<MultiSigService>,
}

impl MultiSigSigner {
    /// Wrap the session manager.
    pub fn new(service: Arc<MultiSigService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TransactionSigner for MultiSigSigner {
    async fn sign(
        &self,
        tx: &ChainTransaction,
        required_signers: usize,
    ) -> Result<SignedTransaction, LifecycleError> {
        let ticket = self
            .service
            .sign(tx, required_signers)
            .await
            .map_err(signing_error)?;
        ticket.wait().await.map_err(signing_error)
    }
}

fn signing_error(e: SigningError) -> LifecycleError {
    LifecycleError::Signing(e.to_string())
}
