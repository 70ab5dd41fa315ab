//! Domain Layer - signing sessions, hints and errors. No I/O.

pub mod config;
pub mod errors;
pub mod hints;
pub mod session;

pub use config::MultiSigConfig;
pub use errors::{ProverError, SigningError};
pub use hints::{CommitmentSecret, Hint, HintKind, HintsBag};
pub use session::{
    Completion, CompletedSession, SessionView, SignatureState, SigningSession, SigningTarget,
};
