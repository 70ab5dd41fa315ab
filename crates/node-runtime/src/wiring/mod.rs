//! # Wiring
//!
//! Periodic drivers for the guard subsystems.

pub mod schedulers;

pub use schedulers::{spawn_guard_schedulers, spawn_periodic};
