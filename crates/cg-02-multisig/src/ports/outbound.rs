//! Signature primitive port.

use crate::domain::{CommitmentSecret, HintsBag, ProverError};
use shared_crypto::GuardPublicKey;
use shared_types::Commitment;

/// Everything the prover needs to add this guard's share.
#[derive(Debug, Clone)]
pub struct SignRequest {
    /// Reduced transaction bytes.
    pub tx_bytes: Vec<u8>,
    /// Number of inputs to sign.
    pub input_count: usize,
    /// This guard's key.
    pub signer: GuardPublicKey,
    /// This guard's secret commitment half.
    pub secret: CommitmentSecret,
    /// Public commitments of other real signers plus proofs already
    /// carried by the candidate being extended.
    pub hints: HintsBag,
    /// Guards to cover with simulated proofs.
    pub simulated: Vec<GuardPublicKey>,
}

/// Discrete-log multi-signature primitive.
///
/// Implementations are synchronous and may be slow; the session manager
/// calls them from a blocking task.
pub trait MultiSigProver: Send + Sync {
    /// Fresh per-input commitment for `tx_bytes`: public half and secret half.
    fn generate_commitment(
        &self,
        tx_bytes: &[u8],
        input_count: usize,
    ) -> Result<(Commitment, CommitmentSecret), ProverError>;

    /// Produce a partial transaction carrying the proofs in `hints`, the
    /// signer's own share and simulated proofs for `simulated`.
    fn sign(&self, request: SignRequest) -> Result<Vec<u8>, ProverError>;

    /// Proofs already in `partial_tx` for the listed real and simulated signers.
    fn extract_hints(
        &self,
        partial_tx: &[u8],
        real: &[GuardPublicKey],
        simulated: &[GuardPublicKey],
    ) -> Result<HintsBag, ProverError>;
}
