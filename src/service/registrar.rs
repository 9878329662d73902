//! Listener registration: optimistic presence update plus channel setup.

use std::sync::Arc;

use chrono::TimeDelta;

use crate::domain::{ChannelAddress, Clock, ListenerId, PresenceMapping, RoomId};
use crate::error::{GatewayError, StoreError};
use crate::store::{PresenceStore, Versioned};
use crate::transport::{ChannelHandle, Transport};

/// Tunables for [`ListenerRegistrar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrarPolicy {
    /// Age after which a presence entry is stale.
    pub ttl: TimeDelta,
    /// CAS conflicts tolerated before giving up; `None` retries forever.
    pub max_retries: Option<u32>,
}

/// Records listeners in a room's presence entry and opens their channel.
///
/// The presence entry is updated with a read / prune / insert /
/// compare-and-swap loop. A conflicting writer makes the swap fail; the
/// loop then starts over from a fresh read, so no concurrent registration
/// is ever overwritten.
#[derive(Debug, Clone)]
pub struct ListenerRegistrar {
    store: Arc<dyn PresenceStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    policy: RegistrarPolicy,
}

impl ListenerRegistrar {
    /// Creates a registrar over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn PresenceStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        policy: RegistrarPolicy,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            policy,
        }
    }

    /// Registers `listener` in `room` and returns its channel handle.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] if the presence update fails (store
    /// unavailable or contention exhausted); no channel is opened in that
    /// case. Returns [`GatewayError::Transport`] if the channel cannot be
    /// opened after the presence update committed.
    pub async fn register(
        &self,
        listener: &ListenerId,
        room: &RoomId,
    ) -> Result<ChannelHandle, GatewayError> {
        self.record_presence(listener, room).await?;
        let address = ChannelAddress::new(listener, room);
        let handle = self.transport.create_channel(&address).await?;
        tracing::info!(%room, %listener, "listener registered");
        Ok(handle)
    }

    /// Inserts or refreshes `listener` in `room`, pruning stale entries.
    ///
    /// Returns the mapping as committed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] as soon as the store fails, and
    /// [`StoreError::ContentionExhausted`] once `max_retries` CAS conflicts
    /// have been observed.
    pub async fn record_presence(
        &self,
        listener: &ListenerId,
        room: &RoomId,
    ) -> Result<PresenceMapping, StoreError> {
        let mut conflicts: u32 = 0;
        loop {
            match self.try_commit(listener, room).await {
                Ok(Some(mapping)) => return Ok(mapping),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        %room,
                        %listener,
                        error = %err,
                        transient = err.is_transient(),
                        "presence update failed"
                    );
                    return Err(err);
                }
            }

            conflicts = conflicts.saturating_add(1);
            if let Some(max) = self.policy.max_retries
                && conflicts >= max
            {
                tracing::warn!(%room, %listener, attempts = conflicts, "presence update contention exhausted");
                return Err(StoreError::ContentionExhausted {
                    room: room.to_string(),
                    attempts: conflicts,
                });
            }
            tracing::debug!(%room, %listener, attempt = conflicts, "presence CAS conflict; retrying");
            tokio::task::yield_now().await;
        }
    }

    /// One read-modify-write round. `Ok(None)` means another writer won.
    async fn try_commit(
        &self,
        listener: &ListenerId,
        room: &RoomId,
    ) -> Result<Option<PresenceMapping>, StoreError> {
        let now = self.clock.now();
        match self.store.get_for_update(room).await? {
            None => {
                let mapping = PresenceMapping::with_listener(listener.clone(), now);
                let created = self.store.set_if_absent(room, &mapping).await?;
                Ok(created.then_some(mapping))
            }
            Some(Versioned {
                mut mapping,
                version,
            }) => {
                let expired = mapping.prune_stale(now, self.policy.ttl);
                mapping.touch(listener.clone(), now);
                let swapped = self.store.compare_and_swap(room, version, &mapping).await?;
                if swapped && !expired.is_empty() {
                    tracing::debug!(%room, pruned = expired.len(), "stale listeners pruned");
                }
                Ok(swapped.then_some(mapping))
            }
        }
    }
}
