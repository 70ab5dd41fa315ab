//! # Dialer Port
//!
//! Channel-scoped pub/sub between guards.

use async_trait::async_trait;
use shared_types::TransportId;
use std::sync::Arc;
use thiserror::Error;

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialerError {
    /// Direct message to an endpoint the dialer does not know.
    #[error("Unknown receiver: {0}")]
    UnknownReceiver(TransportId),

    /// The transport is shut down.
    #[error("Dialer closed")]
    Closed,
}

/// Receives messages delivered on a subscribed channel.
///
/// Implementations must catch their own errors: nothing a handler does may
/// propagate back into the transport.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one delivered message. `sender` is the transport identity of
    /// the endpoint that sent it.
    async fn handle(&self, message: String, channel: &str, sender: TransportId);
}

/// Sends and receives guard messages.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// This endpoint's transport identity.
    fn local_id(&self) -> &TransportId;

    /// Register `handler` for messages on `channel`.
    fn subscribe(&self, channel: &str, handler: Arc<dyn MessageHandler>);

    /// Send `payload` on `channel`; broadcast to every other endpoint when
    /// `receiver` is `None`.
    async fn send_message(
        &self,
        channel: &str,
        payload: String,
        receiver: Option<&TransportId>,
    ) -> Result<(), DialerError>;
}
