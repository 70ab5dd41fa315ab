//! # Devnet
//!
//! N guards in one process over the in-memory network, one shared
//! [`SimulatedChain`] per chain and one [`InMemoryLedger`] per guard. Every
//! guard sees the same chain state, so candidates agree byte for byte.

use std::sync::Arc;
use std::time::Duration;

use cg_04_tx_lifecycle::InMemoryLedger;
use shared_bus::InMemoryNetwork;
use shared_types::{
    ChainAdapters, ChainId, EventId, EventRecord, EventStatus, EventTrigger, LedgerError,
    LedgerStore, SimulatedChain, TimeSource,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::container::{devnet_transport_id, ContainerError, GuardConfig, GuardContainer, GuardPorts};
use crate::wiring::{spawn_guard_schedulers, spawn_periodic};

/// In-process multi-guard network.
pub struct Devnet {
    network: InMemoryNetwork,
    chains: Vec<Arc<SimulatedChain>>,
    guards: Vec<Arc<GuardContainer>>,
    block_interval: Duration,
}

impl Devnet {
    /// Build `config.devnet.guards` guards with deterministic identities.
    pub fn new(config: &GuardConfig, time: Arc<dyn TimeSource>) -> Result<Self, ContainerError> {
        config.validate()?;
        let network = InMemoryNetwork::new();

        let mut chain_ids = vec![ChainId::from(config.devnet.chain.as_str())];
        let reward_chain = ChainId::from(config.agreement.reward_chain.as_str());
        if !chain_ids.contains(&reward_chain) {
            chain_ids.push(reward_chain);
        }
        let chains: Vec<Arc<SimulatedChain>> = chain_ids
            .into_iter()
            .map(|id| {
                let chain = Arc::new(SimulatedChain::new(id, config.devnet.confirmations));
                chain.fund("genesis-box", config.devnet.funding);
                chain
            })
            .collect();
        let adapters = chains
            .iter()
            .fold(ChainAdapters::new(), |adapters, chain| adapters.with(chain.clone()));

        let mut guards = Vec::with_capacity(config.devnet.guards);
        for index in 0..config.devnet.guards {
            let dialer = Arc::new(network.dialer(devnet_transport_id(index)));
            let ports = GuardPorts::new(
                dialer,
                adapters.clone(),
                Arc::new(InMemoryLedger::new()),
                time.clone(),
            );
            guards.push(Arc::new(GuardContainer::new(
                config.for_devnet_guard(index),
                ports,
            )?));
        }

        info!(
            guards = guards.len(),
            required_sign = config.agreement.required_sign,
            "Devnet created"
        );
        Ok(Self {
            network,
            chains,
            guards,
            block_interval: Duration::from_secs(config.devnet.block_interval_secs),
        })
    }

    /// The shared network.
    pub fn network(&self) -> &InMemoryNetwork {
        &self.network
    }

    /// Guard containers in index order.
    pub fn guards(&self) -> &[Arc<GuardContainer>] {
        &self.guards
    }

    /// Simulated chains.
    pub fn chains(&self) -> &[Arc<SimulatedChain>] {
        &self.chains
    }

    /// Store a verified event in every guard's ledger.
    pub async fn seed_event(&self, event: EventTrigger) -> Result<(), LedgerError> {
        for guard in &self.guards {
            guard.ledger.insert_event(EventRecord::pending(event.clone())).await?;
        }
        info!(event_id = %event.id, "Event seeded on every guard");
        Ok(())
    }

    /// Status of `event_id` as seen by guard 0.
    pub async fn event_status(&self, event_id: &EventId) -> Result<Option<EventStatus>, LedgerError> {
        let Some(guard) = self.guards.first() else {
            return Ok(None);
        };
        Ok(guard.ledger.event_by_id(event_id).await?.map(|r| r.status))
    }

    /// Start the handshake from every guard.
    pub async fn register_all(&self) {
        for guard in &self.guards {
            if let Err(e) = guard.registry.register().await {
                warn!(guard_index = guard.index(), error = %e, "[cg-01] registration failed");
            }
        }
    }

    /// Start message delivery, block production and every guard's
    /// schedulers.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let network = self.network.clone();
        let network_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            network.run(network_shutdown).await;
        }));

        let chains = self.chains.clone();
        handles.push(spawn_periodic("sim", self.block_interval, shutdown.clone(), move || {
            for chain in &chains {
                chain.mine(1);
            }
            async {}
        }));

        for guard in &self.guards {
            handles.extend(spawn_guard_schedulers(guard.clone(), shutdown.clone()));
        }
        handles
    }

    /// Abort signing tasks still waiting on a session.
    pub fn abort_signing(&self) {
        for guard in &self.guards {
            guard.lifecycle.abort_signing();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ManualTimeSource;

    fn config(guards: usize, required: usize) -> GuardConfig {
        let mut config = GuardConfig::default();
        config.devnet.guards = guards;
        config.agreement.required_sign = required;
        config
    }

    #[tokio::test]
    async fn test_devnet_handshake_binds_all_guards() {
        let devnet = Devnet::new(&config(4, 3), Arc::new(ManualTimeSource::new(0))).unwrap();
        assert_eq!(devnet.guards().len(), 4);

        devnet.register_all().await;
        devnet.network().flush().await;
        for guard in devnet.guards() {
            assert!(guard.registry.unbound_peers().is_empty());
        }
    }

    #[tokio::test]
    async fn test_seeded_event_is_pending_everywhere() {
        let devnet = Devnet::new(&config(3, 2), Arc::new(ManualTimeSource::new(0))).unwrap();
        let event = EventTrigger {
            id: EventId::from("e1"),
            from_chain: ChainId::from("cardano"),
            to_chain: ChainId::from("ergo"),
            to_address: "alice".into(),
            amount: 1_000,
            bridge_fee: 10,
            network_fee: 5,
            source_tx_id: "lock".into(),
        };
        devnet.seed_event(event).await.unwrap();
        assert_eq!(
            devnet.event_status(&EventId::from("e1")).await.unwrap(),
            Some(EventStatus::PendingPayment)
        );
        assert!(devnet.chains().len() == 1);
    }

    #[test]
    fn test_invalid_quorum_rejected() {
        let result = Devnet::new(&config(3, 4), Arc::new(ManualTimeSource::new(0)));
        assert!(matches!(result, Err(ContainerError::Config(_))));
    }
}
