//! # Shared Bus - Guard-to-Guard Transport
//!
//! The [`Dialer`] port delivers JSON envelopes between guards on named
//! channels. Delivery is at-least-once and unordered: handlers must be
//! idempotent and must never assume FIFO.
//!
//! ```text
//! ┌──────────────┐   send_message()   ┌──────────────┐
//! │   Guard A    │ ─────────┐         │   Guard B    │
//! │              │          │         │              │
//! └──────────────┘          ▼         └──────────────┘
//!                    ┌──────────────┐         ↑
//!                    │    Dialer    │ ────────┘
//!                    │  (channel)   │  handle(msg, channel, sender)
//!                    └──────────────┘
//! ```
//!
//! ## Security
//!
//! - The transport-level `sender` passed to handlers is assigned by the
//!   dialer, never taken from the payload. Subsystems compare it with the
//!   identity claimed inside the signed envelope.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dialer;
pub mod memory;

pub use dialer::{Dialer, DialerError, MessageHandler};
pub use memory::{InMemoryDialer, InMemoryNetwork, NetworkStats};

/// Handshake channel (peer registry).
pub const HANDSHAKE_CHANNEL: &str = "guard-handshake";

/// Multi-signing channel (commitments and partial signatures).
pub const MULTISIG_CHANNEL: &str = "multi-sig";

/// Transaction agreement channel.
pub const AGREEMENT_CHANNEL: &str = "tx-agreement";
