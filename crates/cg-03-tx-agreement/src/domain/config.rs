//! Agreement configuration.

use shared_types::ChainId;
use std::time::Duration;

/// Configuration for the agreement coordinator.
#[derive(Clone, Debug)]
pub struct AgreementConfig {
    /// Distinct endorsements needed to agree on a transaction.
    pub required_sign: usize,
    /// Length of one proposer turn.
    pub turn_duration: Duration,
    /// Chain reward transactions are paid on.
    pub reward_chain: ChainId,
}

impl AgreementConfig {
    /// Turn length in milliseconds, never zero.
    pub fn turn_duration_ms(&self) -> u64 {
        u64::try_from(self.turn_duration.as_millis())
            .unwrap_or(u64::MAX)
            .max(1)
    }
}

impl Default for AgreementConfig {
    fn default() -> Self {
        Self {
            required_sign: 1,
            turn_duration: Duration::from_secs(180), // 3 minutes
            reward_chain: ChainId::from("ergo"),
        }
    }
}
