//! Agreement errors.

use cg_01_peer_registry::RegistryError;
use shared_bus::DialerError;
use shared_types::{
    ChainError, ChainId, EventId, EventStatus, GuardIndex, LedgerError, MessageError, TxId,
};
use thiserror::Error;

/// Agreement coordinator errors.
#[derive(Debug, Error)]
pub enum AgreementError {
    /// This guard does not hold the proposer turn.
    #[error("Guard {own} does not hold the turn (turn holder {turn_holder})")]
    NotMyTurn {
        /// This guard.
        own: GuardIndex,
        /// Current proposer.
        turn_holder: GuardIndex,
    },

    /// A request came from a guard that does not hold the turn.
    #[error("Request from guard {sender} outside its turn (turn holder {turn_holder})")]
    NotProposerTurn {
        /// Requesting guard.
        sender: GuardIndex,
        /// Current proposer.
        turn_holder: GuardIndex,
    },

    /// The candidate's event is not in the ledger.
    #[error("Unknown event: {0}")]
    UnknownEvent(EventId),

    /// The candidate's event is not waiting for this transaction type.
    #[error("Event {event} is {status:?}, not waiting for this transaction")]
    EventNotPending {
        /// Event.
        event: EventId,
        /// Its current status.
        status: EventStatus,
    },

    /// The candidate pays on the wrong chain.
    #[error("Candidate on chain {actual}, expected {expected}")]
    WrongChain {
        /// Chain the event requires.
        expected: ChainId,
        /// Chain of the candidate.
        actual: ChainId,
    },

    /// The candidate does not reflect its event.
    #[error("Candidate {0} does not match its event")]
    InvalidCandidate(TxId),

    /// A vote names a candidate this guard did not propose.
    #[error("No open proposal for {0}")]
    UnknownProposal(TxId),

    /// An approval's id does not match its transaction.
    #[error("Approval for {claimed} carries transaction {actual}")]
    TxIdMismatch {
        /// Id in the approval.
        claimed: TxId,
        /// Id of the carried transaction.
        actual: TxId,
    },

    /// An approval lacks a quorum of valid endorsements.
    #[error("Approval carries {valid} valid endorsements, {required} required")]
    InsufficientEndorsements {
        /// Valid distinct endorsements.
        valid: usize,
        /// Quorum.
        required: usize,
    },

    /// Sender authentication failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Chain adapter failure.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Wire encoding failure.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// Transport failure.
    #[error(transparent)]
    Dialer(#[from] DialerError),
}

impl AgreementError {
    /// Authentication failures and protocol violations, dropped quietly at
    /// the handler boundary.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Chain(_) | Self::Ledger(_) | Self::Dialer(_) | Self::NotMyTurn { .. }
        )
    }
}
