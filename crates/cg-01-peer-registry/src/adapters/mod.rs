//! Adapters - transport handler for the handshake channel.

pub mod handler;

pub use handler::HandshakeHandler;
