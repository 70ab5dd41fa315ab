//! Domain Layer - agreement round state, configuration and errors. No I/O.

pub mod config;
pub mod errors;
pub mod round;

pub use config::AgreementConfig;
pub use errors::AgreementError;
pub use round::{AgreementRound, Proposal, VoteDecision};
