//! # Schedulers
//!
//! Each subsystem is driven by its own `tokio::time::interval` loop; every
//! loop stops when the shared `watch` shutdown signal changes.
//!
//! | Loop        | Period                           | Action                                   |
//! |-------------|----------------------------------|------------------------------------------|
//! | `cg-01`     | `agreement.resend_interval_secs` | re-register while any peer is unbound     |
//! | `cg-02`     | `multisig.cleanup_interval_secs` | sweep timed-out signing sessions          |
//! | `cg-03`     | `agreement.resend_interval_secs` | propose pending events, resend requests   |
//! | `cg-04`     | `lifecycle.poll_interval_secs`   | advance every non-terminal transaction    |
//!
//! A failing iteration is logged and the loop continues.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::container::GuardContainer;

/// Run `task` every `period` until `shutdown` changes.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut task: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => task().await,
                _ = shutdown.changed() => {
                    info!("[{}] Shutdown signal received", name);
                    break;
                }
            }
        }
    })
}

/// Start every scheduler of one guard.
pub fn spawn_guard_schedulers(
    container: Arc<GuardContainer>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let config = &container.config;
    let resend = Duration::from_secs(config.agreement.resend_interval_secs);
    let cleanup = Duration::from_secs(config.multisig.cleanup_interval_secs);
    let poll = Duration::from_secs(config.lifecycle.poll_interval_secs);
    let guard_index = container.index();

    let registry = container.registry.clone();
    let handshake = spawn_periodic("cg-01", resend, shutdown.clone(), move || {
        let registry = registry.clone();
        async move {
            let unbound = registry.unbound_peers();
            if unbound.is_empty() {
                return;
            }
            debug!(guard_index, unbound = ?unbound, "[cg-01] peers still unbound");
            if let Err(e) = registry.register().await {
                warn!(guard_index, error = %e, "[cg-01] registration failed");
            }
        }
    });

    let multisig = container.multisig.clone();
    let sweep = spawn_periodic("cg-02", cleanup, shutdown.clone(), move || {
        let multisig = multisig.clone();
        async move {
            let rejected = multisig.cleanup().await;
            if rejected > 0 {
                info!(guard_index, rejected, "[cg-02] timed-out sessions rejected");
            }
        }
    });

    let agreement = container.agreement.clone();
    let propose = spawn_periodic("cg-03", resend, shutdown.clone(), move || {
        let agreement = agreement.clone();
        async move {
            if let Err(e) = agreement.process_pending_events().await {
                warn!(guard_index, error = %e, "[cg-03] failed to process pending events");
            }
            if let Err(e) = agreement.resend_requests().await {
                warn!(guard_index, error = %e, "[cg-03] failed to resend requests");
            }
        }
    });

    let lifecycle = container.lifecycle.clone();
    let process = spawn_periodic("cg-04", poll, shutdown, move || {
        let lifecycle = lifecycle.clone();
        async move {
            match lifecycle.process_transactions().await {
                Ok(summary) if summary.examined > 0 => {
                    debug!(
                        guard_index,
                        examined = summary.examined,
                        transitioned = summary.transitioned,
                        failed = summary.failed,
                        "[cg-04] cycle complete"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(guard_index, error = %e, "[cg-04] cycle failed"),
            }
        }
    });

    vec![handshake, sweep, propose, process]
}
