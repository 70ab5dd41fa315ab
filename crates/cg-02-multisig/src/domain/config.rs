//! Signing configuration.

use std::time::Duration;

/// Configuration for the signing session manager.
#[derive(Clone, Debug)]
pub struct MultiSigConfig {
    /// Unresolved sessions older than this are rejected by the sweep.
    pub session_timeout: Duration,
    /// Upper bound for a single prover call.
    pub prover_timeout: Duration,
}

impl MultiSigConfig {
    /// Session timeout in milliseconds.
    pub fn session_timeout_ms(&self) -> u64 {
        u64::try_from(self.session_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for MultiSigConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(300), // 5 minutes
            prover_timeout: Duration::from_secs(30),
        }
    }
}
