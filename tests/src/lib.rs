//! # Custody-Guard Test Suite
//!
//! Cross-subsystem flows over the in-memory network.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs     # N-guard devnet driven by a manual clock
//!     ├── handshake.rs   # peer binding over the network
//!     ├── bridge_flow.rs # event -> payment -> reward -> completed
//!     └── faults.rs      # partitions, double spends, resubmission
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cg-tests
//! cargo test -p cg-tests integration::bridge_flow
//! ```

pub mod integration;
