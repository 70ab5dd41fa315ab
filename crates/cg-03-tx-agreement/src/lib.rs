//! # Transaction Agreement Subsystem
//!
//! **Subsystem ID:** cg-03
//!
//! Guards agree on the exact transaction that pays out each event before
//! anyone signs it. The proposer for the current turn builds one candidate
//! per pending event and broadcasts it; every guard re-derives and checks
//! it against the same event and chain state and, if it matches, sends back
//! a signed vote. A quorum of votes makes the candidate the event's agreed
//! transaction, persisted with status `approved`.
//!
//! ## Architecture
//!
//! - **Domain Layer:** [`AgreementRound`], per-turn proposals and votes
//! - **Service Layer:** [`AgreementService`]
//! - **Adapters Layer:** [`AgreementHandler`] for the agreement channel
//!
//! Candidate construction must be deterministic: identical event and chain
//! state yield byte-identical `txJson` on every guard, or votes never match.

pub mod adapters;
pub mod domain;
pub mod service;

pub use adapters::AgreementHandler;
pub use domain::{AgreementConfig, AgreementError, AgreementRound, Proposal, VoteDecision};
pub use service::{AgreementDependencies, AgreementService};
