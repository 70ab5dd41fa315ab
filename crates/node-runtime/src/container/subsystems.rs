//! # Guard Container
//!
//! Holds the subsystem instances of one guard and wires them together.
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: Peer Registry (identity, handshake, authentication)
//! Level 1: Signing Session Manager, Agreement Coordinator (use the registry)
//! Level 2: Lifecycle Processor (signs through the session manager)
//! ```
//!
//! Each message handler is subscribed on its channel before the container is
//! returned, so nothing delivered after construction is lost.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use cg_01_peer_registry::{HandshakeHandler, PeerRegistry, RegistryError};
use cg_02_multisig::{DevProver, MultiSigHandler, MultiSigProver, MultiSigService, SigningError};
use cg_03_tx_agreement::{AgreementDependencies, AgreementHandler, AgreementService};
use cg_04_tx_lifecycle::{LifecycleDependencies, LifecycleService};
use shared_bus::{Dialer, AGREEMENT_CHANNEL, HANDSHAKE_CHANNEL, MULTISIG_CHANNEL};
use shared_types::{ChainAdapters, LedgerStore, TimeSource};

use crate::adapters::MultiSigSigner;
use crate::container::config::{ConfigError, GuardConfig};

/// Errors building a container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Identity does not match the guard list.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Signing session manager could not start.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// External ports a guard runs against.
#[derive(Clone)]
pub struct GuardPorts {
    /// Transport endpoint of this guard.
    pub dialer: Arc<dyn Dialer>,
    /// Chain adapters by chain.
    pub chains: ChainAdapters,
    /// Event and transaction storage.
    pub ledger: Arc<dyn LedgerStore>,
    /// Clock.
    pub time: Arc<dyn TimeSource>,
    /// Signature primitive.
    pub prover: Arc<dyn MultiSigProver>,
}

impl GuardPorts {
    /// Ports with the development prover.
    pub fn new(
        dialer: Arc<dyn Dialer>,
        chains: ChainAdapters,
        ledger: Arc<dyn LedgerStore>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            dialer,
            chains,
            ledger,
            time,
            prover: Arc::new(DevProver::new()),
        }
    }
}

/// Subsystems of one guard.
pub struct GuardContainer {
    /// Validated configuration.
    pub config: GuardConfig,
    /// Peer Registry (cg-01).
    pub registry: Arc<PeerRegistry>,
    /// Signing Session Manager (cg-02).
    pub multisig: Arc<MultiSigService>,
    /// Agreement Coordinator (cg-03).
    pub agreement: Arc<AgreementService>,
    /// Transaction Lifecycle Processor (cg-04).
    pub lifecycle: Arc<LifecycleService>,
    /// Ledger shared by agreement and lifecycle.
    pub ledger: Arc<dyn LedgerStore>,
}

impl GuardContainer {
    /// Validate `config`, build every subsystem and subscribe the handlers.
    pub fn new(config: GuardConfig, ports: GuardPorts) -> Result<Self, ContainerError> {
        config.validate()?;
        let index = config.guard.index;

        // Level 0
        let registry = Arc::new(PeerRegistry::new(
            index,
            config.keypair()?,
            config.guard.public_keys.clone(),
            ports.dialer.clone(),
        )?);

        // Level 1
        let multisig = Arc::new(MultiSigService::new(
            registry.clone(),
            ports.dialer.clone(),
            ports.prover.clone(),
            ports.time.clone(),
            config.multisig_config(),
        )?);
        let agreement = Arc::new(AgreementService::new(AgreementDependencies {
            directory: registry.clone(),
            dialer: ports.dialer.clone(),
            chains: ports.chains.clone(),
            ledger: ports.ledger.clone(),
            time: ports.time.clone(),
            config: config.agreement_config(),
        }));

        // Level 2
        let lifecycle = Arc::new(LifecycleService::new(LifecycleDependencies {
            ledger: ports.ledger.clone(),
            chains: ports.chains,
            signer: Arc::new(MultiSigSigner::new(multisig.clone())),
            time: ports.time,
            config: config.lifecycle_config(),
        }));

        ports
            .dialer
            .subscribe(HANDSHAKE_CHANNEL, Arc::new(HandshakeHandler::new(registry.clone())));
        ports
            .dialer
            .subscribe(MULTISIG_CHANNEL, Arc::new(MultiSigHandler::new(multisig.clone())));
        ports
            .dialer
            .subscribe(AGREEMENT_CHANNEL, Arc::new(AgreementHandler::new(agreement.clone())));

        info!(
            guard_index = index,
            transport = %ports.dialer.local_id(),
            guards = config.guard.public_keys.len(),
            required_sign = config.agreement.required_sign,
            "Guard container initialized"
        );

        Ok(Self {
            config,
            registry,
            multisig,
            agreement,
            lifecycle,
            ledger: ports.ledger,
        })
    }

    /// This guard's index.
    pub fn index(&self) -> usize {
        self.config.guard.index
    }
}
