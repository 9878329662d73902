//! Room-wide fan-out to every live listener except the sender.

use std::sync::Arc;

use chrono::TimeDelta;
use futures_util::future::join_all;
use serde::Serialize;

use super::DirectedSender;
use crate::domain::{Clock, ListenerId, RoomId};
use crate::error::StoreError;
use crate::store::PresenceStore;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Recipients the transport accepted.
    pub delivered: usize,
    /// Recipients whose delivery failed.
    pub failed: usize,
    /// Entries skipped because they were stale.
    pub skipped_stale: usize,
}

/// Fans a message out to a room.
///
/// Reads the presence entry once without a version, so broadcasts never
/// contend with registrations. A listener that joined after the read is
/// missed for this message. Stale entries are skipped but left in the
/// store; pruning is the registrar's job.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    store: Arc<dyn PresenceStore>,
    sender: DirectedSender,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl Broadcaster {
    /// Creates a broadcaster.
    #[must_use]
    pub fn new(
        store: Arc<dyn PresenceStore>,
        sender: DirectedSender,
        clock: Arc<dyn Clock>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            store,
            sender,
            clock,
            ttl,
        }
    }

    /// Sends `message` from `from` to every other live listener in `room`.
    ///
    /// An absent or empty room is a no-op. Deliveries run concurrently;
    /// a failed delivery is logged and counted without affecting the rest.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the presence entry cannot be read.
    pub async fn broadcast(
        &self,
        from: &ListenerId,
        room: &RoomId,
        message: &serde_json::Value,
    ) -> Result<BroadcastReport, StoreError> {
        let Some(mapping) = self.store.get(room).await? else {
            tracing::debug!(%room, "broadcast to empty room dropped");
            return Ok(BroadcastReport::default());
        };

        let now = self.clock.now();
        let recipients: Vec<&ListenerId> = mapping
            .live_listeners(now, self.ttl)
            .filter(|id| *id != from)
            .collect();
        let live = mapping.live_listeners(now, self.ttl).count();

        let outcomes = join_all(recipients.iter().map(|to| async move {
            let result = self.sender.send_direct(from, to, room, message).await;
            if let Err(err) = &result {
                tracing::warn!(%room, %from, %to, error = %err, "delivery failed");
            }
            result.is_ok()
        }))
        .await;

        let delivered = outcomes.iter().filter(|ok| **ok).count();
        let report = BroadcastReport {
            delivered,
            failed: outcomes.len().saturating_sub(delivered),
            skipped_stale: mapping.len().saturating_sub(live),
        };
        tracing::info!(
            %room,
            %from,
            delivered = report.delivered,
            failed = report.failed,
            "broadcast complete"
        );
        Ok(report)
    }
}
