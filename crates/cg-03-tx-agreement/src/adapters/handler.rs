//! Agreement channel handler.

use crate::service::AgreementService;
use async_trait::async_trait;
use shared_bus::MessageHandler;
use shared_types::{GuardMessage, TransportId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes `request`, `response` and `approval` messages to the
/// [`AgreementService`].
pub struct AgreementHandler {
    service: Arc<AgreementService>,
}

impl AgreementHandler {
    /// Wrap a service.
    pub fn new(service: Arc<AgreementService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for AgreementHandler {
    async fn handle(&self, message: String, channel: &str, sender: TransportId) {
        let parsed = match GuardMessage::from_json(&message) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(channel, sender = %sender, error = %e, "[cg-03] dropping malformed message");
                return;
            }
        };

        let result = match &parsed {
            GuardMessage::Request(signed) => self.service.handle_request(&sender, signed).await,
            GuardMessage::Response(vote) => self.service.handle_response(&sender, vote).await,
            GuardMessage::Approval(approval) => {
                self.service.handle_approval(&sender, approval).await
            }
            other => {
                debug!(kind = other.kind(), sender = %sender, "[cg-03] ignoring non-agreement message");
                return;
            }
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_rejection() => {
                debug!(kind = parsed.kind(), sender = %sender, error = %e, "[cg-03] message dropped");
            }
            Err(e) => {
                warn!(kind = parsed.kind(), sender = %sender, error = %e, "[cg-03] failed to process message");
            }
        }
    }
}
