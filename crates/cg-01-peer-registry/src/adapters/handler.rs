//! Handshake channel handler.

use crate::service::PeerRegistry;
use async_trait::async_trait;
use shared_bus::MessageHandler;
use shared_types::{GuardMessage, TransportId};
use std::sync::Arc;
use tracing::debug;

/// Routes `register` and `approve` messages to the [`PeerRegistry`].
///
/// Every failure is an authentication failure or protocol violation, so the
/// message is dropped and logged at debug level.
pub struct HandshakeHandler {
    registry: Arc<PeerRegistry>,
}

impl HandshakeHandler {
    /// Wrap a registry.
    pub fn new(registry: Arc<PeerRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl MessageHandler for HandshakeHandler {
    async fn handle(&self, message: String, channel: &str, sender: TransportId) {
        let parsed = match GuardMessage::from_json(&message) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(channel, sender = %sender, error = %e, "[cg-01] dropping malformed message");
                return;
            }
        };

        let result = match &parsed {
            GuardMessage::Register(signed) => self.registry.handle_register(&sender, signed).await,
            GuardMessage::Approve(signed) => self.registry.handle_approve(&sender, signed).await,
            other => {
                debug!(kind = other.kind(), sender = %sender, "[cg-01] ignoring non-handshake message");
                return;
            }
        };

        if let Err(e) = result {
            debug!(kind = parsed.kind(), sender = %sender, error = %e, "[cg-01] handshake message dropped");
        }
    }
}
