//! # Status Transitions
//!
//! ```text
//! approved ─▶ in-sign ─▶ signed ─▶ sent ─▶ completed
//!               │          ▲  │      │
//!               ▼          │  ▼      ▼
//!           sign-failed ───┘ invalid ◀┘
//! ```
//!
//! `sign-failed` also reconciles to `in-sign`, `sent`, `completed` or
//! `invalid` depending on what the chain reports. A dropped `sent` record
//! without signature bytes goes back to `in-sign`.

use crate::domain::LifecycleError;
use shared_types::{PersistedTransaction, TransactionStatus};

/// True if `from → to` is a lifecycle transition.
pub fn is_allowed(from: TransactionStatus, to: TransactionStatus) -> bool {
    use TransactionStatus::*;
    matches!(
        (from, to),
        (Approved, InSign)
            | (InSign, Signed)
            | (InSign, SignFailed)
            | (SignFailed, Signed)
            | (SignFailed, InSign)
            | (SignFailed, Sent)
            | (SignFailed, Completed)
            | (SignFailed, Invalid)
            | (Signed, Sent)
            | (Signed, Invalid)
            | (Sent, InSign)
            | (Sent, Completed)
            | (Sent, Invalid)
    )
}

/// Move `record` to `to`, stamping the update time.
pub fn transition(
    mut record: PersistedTransaction,
    to: TransactionStatus,
    now: u64,
) -> Result<PersistedTransaction, LifecycleError> {
    if !is_allowed(record.status, to) {
        return Err(LifecycleError::InvalidTransition {
            tx_id: record.tx_id,
            from: record.status,
            to,
        });
    }
    record.status = to;
    record.last_status_update = now;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::TransactionStatus::*;

    #[test]
    fn test_terminal_states_have_no_exit() {
        for to in [Approved, InSign, Signed, SignFailed, Sent, Invalid, Completed] {
            assert!(!is_allowed(Completed, to));
            assert!(!is_allowed(Invalid, to));
        }
    }

    #[test]
    fn test_happy_path() {
        assert!(is_allowed(Approved, InSign));
        assert!(is_allowed(InSign, Signed));
        assert!(is_allowed(Signed, Sent));
        assert!(is_allowed(Sent, Completed));
    }

    #[test]
    fn test_no_skipping_signature() {
        assert!(!is_allowed(Approved, Signed));
        assert!(!is_allowed(Approved, Sent));
        assert!(!is_allowed(InSign, Sent));
        assert!(!is_allowed(Sent, Signed));
    }
}
