//! Point-to-point delivery of one message to one listener.

use std::sync::Arc;

use crate::domain::{ChannelAddress, Envelope, ListenerId, RoomId};
use crate::error::TransportError;
use crate::transport::Transport;

/// Wraps a message in an [`Envelope`] and pushes it to the recipient's
/// channel in a room.
///
/// Presence is not consulted: delivery to an unknown or expired listener
/// is attempted and the transport decides the outcome.
#[derive(Debug, Clone)]
pub struct DirectedSender {
    transport: Arc<dyn Transport>,
}

impl DirectedSender {
    /// Creates a sender over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sends `message` from `from` to `to` in `room`.
    ///
    /// # Errors
    ///
    /// Returns the [`TransportError`] reported by the transport, or
    /// [`TransportError::Payload`] if the envelope cannot be serialized.
    pub async fn send_direct(
        &self,
        from: &ListenerId,
        to: &ListenerId,
        room: &RoomId,
        message: &serde_json::Value,
    ) -> Result<(), TransportError> {
        let envelope = Envelope::new(message.clone(), from.clone(), to.clone());
        let payload =
            serde_json::to_string(&envelope).map_err(|e| TransportError::Payload(e.to_string()))?;
        let address = ChannelAddress::new(to, room);
        tracing::debug!(%room, %from, %to, "sending message");
        self.transport.send(&address, payload).await
    }
}
