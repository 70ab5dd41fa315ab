//! Multi-sig channel handler.

use crate::domain::SigningError;
use crate::service::MultiSigService;
use async_trait::async_trait;
use shared_bus::MessageHandler;
use shared_types::{GuardMessage, TransportId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes signing messages to the [`MultiSigService`].
pub struct MultiSigHandler {
    service: Arc<MultiSigService>,
}

impl MultiSigHandler {
    /// Wrap a service.
    pub fn new(service: Arc<MultiSigService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for MultiSigHandler {
    async fn handle(&self, message: String, channel: &str, sender: TransportId) {
        let parsed = match GuardMessage::from_json(&message) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(channel, sender = %sender, error = %e, "[cg-02] dropping malformed message");
                return;
            }
        };

        let result = match &parsed {
            GuardMessage::Commitment(signed) => {
                self.service.handle_commitment(&sender, signed).await
            }
            GuardMessage::Sign(signed) => self.service.handle_sign(&sender, signed).await,
            other => {
                debug!(kind = other.kind(), sender = %sender, "[cg-02] ignoring non-signing message");
                return;
            }
        };

        match result {
            Ok(()) => {}
            // Authentication failures and malformed candidates are routine noise.
            Err(
                e @ (SigningError::Registry(_)
                | SigningError::UnknownSigner(_)
                | SigningError::InconsistentSigners(_)),
            ) => {
                debug!(kind = parsed.kind(), sender = %sender, error = %e, "[cg-02] message dropped");
            }
            Err(e) => {
                warn!(kind = parsed.kind(), sender = %sender, error = %e, "[cg-02] failed to process message");
            }
        }
    }
}
