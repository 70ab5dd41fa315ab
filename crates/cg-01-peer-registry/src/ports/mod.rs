//! # Ports Layer
//!
//! - **Driving Port (Inbound):** [`GuardDirectory`], used by the signing and
//!   agreement subsystems to sign and authenticate guard messages.
//! - **Driven Port (Outbound):** the [`Dialer`](shared_bus::Dialer) from
//!   `shared-bus`, used to send handshake messages.

pub mod inbound;

pub use inbound::GuardDirectory;
