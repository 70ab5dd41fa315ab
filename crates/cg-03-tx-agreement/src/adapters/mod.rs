//! Adapters Layer - the agreement channel handler.

pub mod handler;

pub use handler::AgreementHandler;
