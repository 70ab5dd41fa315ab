//! Lifecycle configuration.

use std::time::Duration;

/// Configuration for the lifecycle processor.
#[derive(Clone, Debug)]
pub struct LifecycleConfig {
    /// An `in-sign` record older than this moves to `sign-failed`.
    pub sign_timeout: Duration,
    /// A `sent` transaction missing from the chain is given this long after
    /// its last submission before it is resubmitted or invalidated.
    pub resubmit_window: Duration,
}

impl LifecycleConfig {
    /// Sign timeout in milliseconds.
    pub fn sign_timeout_ms(&self) -> u64 {
        u64::try_from(self.sign_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Resubmission window in milliseconds.
    pub fn resubmit_window_ms(&self) -> u64 {
        u64::try_from(self.resubmit_window.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sign_timeout: Duration::from_secs(360),
            resubmit_window: Duration::from_secs(600),
        }
    }
}
