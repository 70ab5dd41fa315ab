//! # Signing Session Manager Subsystem
//!
//! **Subsystem ID:** cg-02
//!
//! Threshold (`t`-of-`n`) multi-signature coordination over a discrete-log
//! signature primitive. Every guard publishes a per-input commitment, the
//! first guard to see enough commitments starts a partial signature that
//! simulates the absent guards, and each real signer extends it until the
//! quorum is reached.
//!
//! ## Architecture
//!
//! - **Domain Layer:** [`SigningSession`] state machine, hints, errors
//! - **Ports Layer:** [`MultiSigProver`], the signature primitive
//! - **Service Layer:** [`MultiSigService`], the session map under one lock
//! - **Adapters Layer:** [`MultiSigHandler`] and the development [`DevProver`]
//!
//! ## Guarantees
//!
//! - A session resolves its caller at most once: on reaching the quorum, on
//!   the timeout sweep, or by abandonment when `sign()` is called again.
//! - A message that fails authentication leaves every session unchanged.
//! - The stored candidate's real-signer set never shrinks.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{DevProver, MultiSigHandler};
pub use domain::{
    CommitmentSecret, HintKind, HintsBag, MultiSigConfig, ProverError, SessionView,
    SignatureState, SigningError, SigningSession, SigningTarget,
};
pub use ports::{MultiSigProver, SignRequest};
pub use service::{MultiSigService, SigningTicket};
