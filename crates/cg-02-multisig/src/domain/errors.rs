//! Signing errors.

use cg_01_peer_registry::RegistryError;
use shared_bus::DialerError;
use shared_types::{MessageError, TxId};
use thiserror::Error;

/// Errors raised by the signature primitive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProverError {
    /// Partial transaction or hint bytes could not be decoded.
    #[error("Malformed prover input: {0}")]
    Malformed(String),

    /// Secret does not cover every input.
    #[error("Secret covers {actual} inputs, transaction has {expected}")]
    InputCountMismatch {
        /// Inputs in the transaction.
        expected: usize,
        /// Inputs the secret covers.
        actual: usize,
    },

    /// A carried proof does not match its signer's published commitment.
    #[error("Proof for input {input} does not match the signer's commitment")]
    CommitmentMismatch {
        /// Offending input.
        input: usize,
    },

    /// A real proof fails verification.
    #[error("Invalid proof for input {0}")]
    InvalidProof(usize),
}

/// Signing session errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// The session was swept before reaching the signer quorum.
    #[error("Signing session for {0} timed out")]
    Timeout(TxId),

    /// The completion handle was replaced or dropped.
    #[error("Signing session for {0} was abandoned")]
    Abandoned(TxId),

    /// The prover did not answer within the configured bound.
    #[error("Prover timed out for {0}")]
    ProverTimeout(TxId),

    /// Prover failure.
    #[error(transparent)]
    Prover(#[from] ProverError),

    /// Sender authentication failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Candidate names a key outside the guard list.
    #[error("Unknown signer in candidate for {0}")]
    UnknownSigner(TxId),

    /// Candidate lists a guard as both real and simulated, or twice.
    #[error("Inconsistent signer sets in candidate for {0}")]
    InconsistentSigners(TxId),

    /// `required_signers` is zero or exceeds the guard count.
    #[error("Invalid signer quorum {required} for {guards} guards")]
    InvalidQuorum {
        /// Requested quorum.
        required: usize,
        /// Guard count.
        guards: usize,
    },

    /// Session disappeared while the prover was running.
    #[error("Signing session for {0} closed")]
    SessionClosed(TxId),

    /// Wire encoding failure.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// Transport failure.
    #[error(transparent)]
    Dialer(#[from] DialerError),

    /// Blocking task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}
