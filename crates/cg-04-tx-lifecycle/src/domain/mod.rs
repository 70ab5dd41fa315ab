//! Domain Layer - status transitions, configuration and errors. No I/O.

pub mod config;
pub mod errors;
pub mod transitions;

pub use config::LifecycleConfig;
pub use errors::LifecycleError;
pub use transitions::{is_allowed, transition};
