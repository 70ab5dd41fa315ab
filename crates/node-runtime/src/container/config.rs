//! # Guard Configuration
//!
//! Unified configuration for the guard and its subsystems.
//!
//! Sources, later ones winning:
//!
//! 1. `Default` impls below
//! 2. TOML file named by `CG_CONFIG` (every section and field optional)
//! 3. `CG_GUARD_INDEX` and `CG_GUARD_SEED` environment variables
//!
//! ## Security Requirements
//!
//! - The guard seed is never printed; `Debug` redacts it.
//! - `validate()` must pass before any subsystem is built.

use cg_02_multisig::MultiSigConfig;
use cg_03_tx_agreement::AgreementConfig;
use cg_04_tx_lifecycle::LifecycleConfig;
use serde::Deserialize;
use shared_crypto::{tagged_hash, CryptoError, GuardKeyPair, GuardPublicKey};
use shared_types::{ChainId, GuardIndex, TransportId};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the TOML file.
pub const ENV_CONFIG: &str = "CG_CONFIG";
/// Environment override for `guard.index`.
pub const ENV_GUARD_INDEX: &str = "CG_GUARD_INDEX";
/// Environment override for `guard.seed`.
pub const ENV_GUARD_SEED: &str = "CG_GUARD_SEED";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Cause.
        source: std::io::Error,
    },

    /// File is not valid TOML for [`GuardConfig`].
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment override could not be parsed.
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// The seed is missing or malformed.
    #[error("Invalid guard seed: {0}")]
    Seed(#[from] CryptoError),

    /// No seed configured.
    #[error("Guard seed is not set; provide guard.seed or CG_GUARD_SEED")]
    MissingSeed,

    /// Values are inconsistent with each other.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete guard configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Identity of this guard.
    pub guard: GuardSection,
    /// Signing session manager.
    pub multisig: MultiSigSection,
    /// Agreement coordinator.
    pub agreement: AgreementSection,
    /// Lifecycle processor.
    pub lifecycle: LifecycleSection,
    /// In-process devnet.
    pub devnet: DevnetSection,
}

/// Identity of this guard.
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardSection {
    /// Position in `public_keys`.
    pub index: GuardIndex,
    /// Hex-encoded Ed25519 seed.
    pub seed: Option<String>,
    /// Ordered public keys of every guard, this one included.
    pub public_keys: Vec<GuardPublicKey>,
    /// Transport identity; defaults to `guard-<index>`.
    pub transport_id: Option<String>,
}

impl std::fmt::Debug for GuardSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardSection")
            .field("index", &self.index)
            .field("seed", &self.seed.as_ref().map(|_| "<redacted>"))
            .field("public_keys", &self.public_keys.len())
            .field("transport_id", &self.transport_id)
            .finish()
    }
}

/// Signing session manager settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultiSigSection {
    /// Unresolved sessions older than this are rejected.
    pub session_timeout_secs: u64,
    /// Upper bound for one prover call.
    pub prover_timeout_secs: u64,
    /// Period of the session sweep.
    pub cleanup_interval_secs: u64,
}

impl Default for MultiSigSection {
    fn default() -> Self {
        Self {
            session_timeout_secs: 300,
            prover_timeout_secs: 30,
            cleanup_interval_secs: 60,
        }
    }
}

/// Agreement coordinator settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgreementSection {
    /// Endorsements (and signers) required per transaction.
    pub required_sign: usize,
    /// Length of one proposer turn.
    pub turn_duration_secs: u64,
    /// Period of proposal and request resend.
    pub resend_interval_secs: u64,
    /// Chain that pays rewards.
    pub reward_chain: String,
}

impl Default for AgreementSection {
    fn default() -> Self {
        Self {
            required_sign: 3,
            turn_duration_secs: 180,
            resend_interval_secs: 30,
            reward_chain: "ergo".into(),
        }
    }
}

/// Lifecycle processor settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleSection {
    /// Period of the processing cycle.
    pub poll_interval_secs: u64,
    /// `in-sign` records older than this move to `sign-failed`.
    pub sign_timeout_secs: u64,
    /// Grace period before a missing `sent` transaction is resubmitted.
    pub resubmit_window_secs: u64,
}

impl Default for LifecycleSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            sign_timeout_secs: 360,
            resubmit_window_secs: 600,
        }
    }
}

/// In-process devnet settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DevnetSection {
    /// Number of guards.
    pub guards: usize,
    /// Chain the seeded event is paid on.
    pub chain: String,
    /// Depth at which the simulated chain reports finality.
    pub confirmations: u64,
    /// Period at which the simulated chain mines a block.
    pub block_interval_secs: u64,
    /// Value locked at the bridge address at startup.
    pub funding: u64,
}

impl Default for DevnetSection {
    fn default() -> Self {
        Self {
            guards: 5,
            chain: "ergo".into(),
            confirmations: 2,
            block_interval_secs: 5,
            funding: 1_000_000,
        }
    }
}

impl GuardConfig {
    /// Load defaults, the optional `CG_CONFIG` file and environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(ENV_CONFIG) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `CG_GUARD_INDEX` and `CG_GUARD_SEED` as returned by `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_GUARD_INDEX) {
            self.guard.index = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_GUARD_INDEX,
                value,
            })?;
        }
        if let Some(seed) = lookup(ENV_GUARD_SEED) {
            self.guard.seed = Some(seed.trim().to_string());
        }
        Ok(())
    }

    /// Number of guards in the configured guard list, or the devnet size
    /// when no list is configured.
    pub fn guard_count(&self) -> usize {
        if self.guard.public_keys.is_empty() {
            self.devnet.guards
        } else {
            self.guard.public_keys.len()
        }
    }

    /// Reject inconsistent values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let guards = self.guard_count();
        if guards == 0 {
            return Err(ConfigError::Invalid("no guards configured".into()));
        }
        let required = self.agreement.required_sign;
        if required == 0 || required > guards {
            return Err(ConfigError::Invalid(format!(
                "agreement.required_sign must be in 1..={guards}, got {required}"
            )));
        }
        if self.guard.index >= guards {
            return Err(ConfigError::Invalid(format!(
                "guard.index {} out of range for {guards} guards",
                self.guard.index
            )));
        }

        let periods = [
            ("multisig.session_timeout_secs", self.multisig.session_timeout_secs),
            ("multisig.prover_timeout_secs", self.multisig.prover_timeout_secs),
            ("multisig.cleanup_interval_secs", self.multisig.cleanup_interval_secs),
            ("agreement.turn_duration_secs", self.agreement.turn_duration_secs),
            ("agreement.resend_interval_secs", self.agreement.resend_interval_secs),
            ("lifecycle.poll_interval_secs", self.lifecycle.poll_interval_secs),
            ("lifecycle.sign_timeout_secs", self.lifecycle.sign_timeout_secs),
            ("lifecycle.resubmit_window_secs", self.lifecycle.resubmit_window_secs),
            ("devnet.block_interval_secs", self.devnet.block_interval_secs),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be positive")));
        }
        Ok(())
    }

    /// This guard's keypair.
    pub fn keypair(&self) -> Result<GuardKeyPair, ConfigError> {
        let seed = self.guard.seed.as_deref().ok_or(ConfigError::MissingSeed)?;
        Ok(GuardKeyPair::from_hex_seed(seed)?)
    }

    /// This guard's transport identity.
    pub fn transport_id(&self) -> TransportId {
        match &self.guard.transport_id {
            Some(id) => TransportId::from(id.as_str()),
            None => devnet_transport_id(self.guard.index),
        }
    }

    /// Configuration of guard `index` in a devnet of `devnet.guards` guards
    /// with deterministic seeds.
    pub fn for_devnet_guard(&self, index: GuardIndex) -> Self {
        let public_keys = (0..self.devnet.guards)
            .map(|i| GuardKeyPair::from_seed(devnet_seed(i)).public_key())
            .collect();
        let mut config = self.clone();
        config.guard = GuardSection {
            index,
            seed: Some(hex::encode(devnet_seed(index))),
            public_keys,
            transport_id: Some(devnet_transport_id(index).to_string()),
        };
        config
    }

    /// Settings for the signing session manager.
    pub fn multisig_config(&self) -> MultiSigConfig {
        MultiSigConfig {
            session_timeout: Duration::from_secs(self.multisig.session_timeout_secs),
            prover_timeout: Duration::from_secs(self.multisig.prover_timeout_secs),
        }
    }

    /// Settings for the agreement coordinator.
    pub fn agreement_config(&self) -> AgreementConfig {
        AgreementConfig {
            required_sign: self.agreement.required_sign,
            turn_duration: Duration::from_secs(self.agreement.turn_duration_secs),
            reward_chain: ChainId::from(self.agreement.reward_chain.as_str()),
        }
    }

    /// Settings for the lifecycle processor.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            sign_timeout: Duration::from_secs(self.lifecycle.sign_timeout_secs),
            resubmit_window: Duration::from_secs(self.lifecycle.resubmit_window_secs),
        }
    }
}

/// Deterministic devnet seed for guard `index`. Not for production keys.
pub fn devnet_seed(index: GuardIndex) -> [u8; 32] {
    tagged_hash("custody-guard/devnet-seed", &[&(index as u64).to_be_bytes()])
}

/// Devnet transport identity for guard `index`.
pub fn devnet_transport_id(index: GuardIndex) -> TransportId {
    TransportId::from(format!("guard-{index}"))
}
