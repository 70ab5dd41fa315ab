//! # Guard Container
//!
//! Configuration and dependency injection for one guard.
//!
//! - Subsystems initialized in dependency order (registry first)
//! - Subsystems talk to peers only through the Dialer port
//! - Adapters implement each subsystem's outbound ports

pub mod config;
pub mod subsystems;

pub use config::{devnet_seed, devnet_transport_id, ConfigError, GuardConfig};
pub use subsystems::{ContainerError, GuardContainer, GuardPorts};
