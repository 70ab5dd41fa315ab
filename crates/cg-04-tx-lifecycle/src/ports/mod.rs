//! # Ports Layer
//!
//! - **Driven Port (Outbound):** [`TransactionSigner`], the signing session
//!   manager as seen from the lifecycle.
//!
//! Chain access and storage use the shared
//! [`ChainAdapter`](shared_types::ChainAdapter) and
//! [`LedgerStore`](shared_types::LedgerStore) ports.

pub mod outbound;

pub use outbound::TransactionSigner;
