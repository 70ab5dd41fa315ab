//! # Custody-Guard Node Runtime
//!
//! Runs an N-guard devnet in one process and drives one seeded event
//! through agreement, threshold signing and confirmation, for both its
//! payment and its reward transaction.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (`CG_CONFIG`, `CG_GUARD_INDEX`, `CG_GUARD_SEED`)
//! 3. Build every guard container and validate the configuration
//! 4. Handshake, seed the event, start schedulers
//! 5. Run until the event completes or Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};

use node_runtime::{init_logging, Devnet, GuardConfig};
use shared_types::{ChainId, EventId, EventStatus, EventTrigger, SystemTimeSource};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn devnet_event(config: &GuardConfig) -> EventTrigger {
    EventTrigger {
        id: EventId::from("devnet-event-1"),
        from_chain: ChainId::from("cardano"),
        to_chain: ChainId::from(config.devnet.chain.as_str()),
        to_address: "devnet-user".into(),
        amount: 10_000,
        bridge_fee: 250,
        network_fee: 50,
        source_tx_id: "devnet-lock-1".into(),
    }
}

async fn wait_for_completion(devnet: &Devnet, event_id: &EventId) -> Result<()> {
    let mut last = None;
    loop {
        let status = devnet
            .event_status(event_id)
            .await
            .context("Failed to read event status")?;
        if status != last {
            info!(event_id = %event_id, status = ?status, "Event status changed");
            last = status;
        }
        if status == Some(EventStatus::Completed) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging().context("Failed to install logging")?;

    let config = GuardConfig::load().context("Failed to load configuration")?;
    info!("===========================================");
    info!("  Custody-Guard Node Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("  Devnet: {} guards", config.devnet.guards);
    info!("===========================================");

    let devnet =
        Devnet::new(&config, Arc::new(SystemTimeSource)).context("Failed to build devnet")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = devnet.spawn(shutdown_rx);

    devnet.register_all().await;
    let event = devnet_event(&config);
    let event_id = event.id.clone();
    devnet
        .seed_event(event)
        .await
        .context("Failed to seed devnet event")?;

    tokio::select! {
        result = wait_for_completion(&devnet, &event_id) => {
            result?;
            info!(event_id = %event_id, "Event completed on every step");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Interrupted");
        }
    }

    info!("Initiating graceful shutdown...");
    if let Err(e) = shutdown_tx.send(true) {
        error!("Failed to send shutdown signal: {}", e);
    }
    devnet.abort_signing();
    for handle in handles {
        if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
            error!("Task did not stop within {:?}", SHUTDOWN_GRACE);
        }
    }
    info!("Shutdown complete");
    Ok(())
}
