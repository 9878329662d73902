//! Relay service: the entry point handlers call for joins and messages.

use std::sync::Arc;

use crate::domain::{Clock, ListenerId, RoomId};
use crate::error::GatewayError;
use crate::store::PresenceStore;
use crate::transport::{ChannelHandle, Transport};

use super::{BroadcastReport, Broadcaster, DirectedSender, ListenerRegistrar, RegistrarPolicy};

/// Coordinates the registrar, broadcaster and directed sender over one
/// presence store and one transport.
///
/// Stateless apart from its collaborators; cheap to share behind an
/// [`Arc`].
#[derive(Debug, Clone)]
pub struct RelayService {
    registrar: ListenerRegistrar,
    broadcaster: Broadcaster,
    sender: DirectedSender,
}

impl RelayService {
    /// Wires the three core components to shared collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn PresenceStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        policy: RegistrarPolicy,
    ) -> Self {
        let sender = DirectedSender::new(Arc::clone(&transport));
        let broadcaster = Broadcaster::new(
            Arc::clone(&store),
            sender.clone(),
            Arc::clone(&clock),
            policy.ttl,
        );
        let registrar = ListenerRegistrar::new(store, transport, clock, policy);
        Self {
            registrar,
            broadcaster,
            sender,
        }
    }

    /// Registers `listener` in `room` and returns its channel handle.
    ///
    /// # Errors
    ///
    /// See [`ListenerRegistrar::register`].
    pub async fn join(
        &self,
        listener: &ListenerId,
        room: &RoomId,
    ) -> Result<ChannelHandle, GatewayError> {
        self.registrar.register(listener, room).await
    }

    /// Delivers `message` from `from` in `room`.
    ///
    /// With a recipient the message goes to that listener only, without a
    /// presence lookup; without one it is broadcast to the room.
    ///
    /// # Errors
    ///
    /// A directed send returns the transport error. A broadcast only fails
    /// when the presence entry cannot be read; per-recipient failures are
    /// counted in the report.
    pub async fn post_message(
        &self,
        from: &ListenerId,
        to: Option<&ListenerId>,
        room: &RoomId,
        message: &serde_json::Value,
    ) -> Result<BroadcastReport, GatewayError> {
        match to {
            Some(to) => {
                self.sender.send_direct(from, to, room, message).await?;
                Ok(BroadcastReport {
                    delivered: 1,
                    ..BroadcastReport::default()
                })
            }
            None => Ok(self.broadcaster.broadcast(from, room, message).await?),
        }
    }
}
