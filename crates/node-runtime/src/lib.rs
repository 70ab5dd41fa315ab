//! # Node Runtime Library
//!
//! Wiring for a Custody-Guard node. The main entry point is the `main.rs`
//! binary, which runs a devnet; the library exposes the pieces so tests and
//! other binaries can assemble guards over their own ports.
//!
//! - `container/` - configuration and per-guard dependency injection
//! - `adapters/` - ports implemented by one subsystem for another
//! - `wiring/` - interval schedulers
//! - `devnet` - N guards in one process

#![warn(missing_docs)]

pub mod adapters;
pub mod container;
pub mod devnet;
pub mod wiring;

pub use container::{GuardConfig, GuardContainer, GuardPorts};
pub use devnet::Devnet;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_logging() -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish()
        .try_init()
}
