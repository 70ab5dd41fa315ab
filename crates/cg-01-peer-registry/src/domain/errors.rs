//! Domain errors for the peer registry.

use shared_bus::DialerError;
use shared_types::{GuardIndex, MessageError, TransportId};
use thiserror::Error;

/// Peer registry errors.
///
/// Every variant raised while handling an inbound message is an
/// authentication failure or protocol violation: the message is dropped and
/// no state changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Claimed index is outside the guard list.
    #[error("Unknown guard index {0}")]
    UnknownGuard(GuardIndex),

    /// Signature does not verify against the claimed guard's key.
    #[error("Invalid signature from guard {0}")]
    InvalidSignature(GuardIndex),

    /// Transport sender differs from the identity claimed or bound.
    #[error("Sender {actual} does not match {expected} for guard {index}")]
    SenderMismatch {
        /// Claimed guard.
        index: GuardIndex,
        /// Transport the guard is known under.
        expected: TransportId,
        /// Transport the message came from.
        actual: TransportId,
    },

    /// Transport is not bound to any guard.
    #[error("Transport {0} is not bound to a guard")]
    UnknownTransport(TransportId),

    /// Guard has not completed a handshake.
    #[error("Guard {0} has no transport binding")]
    Unbound(GuardIndex),

    /// Echoed nonce matches nothing we issued.
    #[error("Nonce mismatch from guard {0}")]
    NonceMismatch(GuardIndex),

    /// Own key is not the key listed at the configured index.
    #[error("Own key does not match guard list entry {0}")]
    KeyMismatch(GuardIndex),

    /// Wire encoding failure.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// Transport failure.
    #[error(transparent)]
    Dialer(#[from] DialerError),
}
