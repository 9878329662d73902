//! Test doubles for the presence store and push transport.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Barrier, Mutex};

use crate::domain::{ChannelAddress, Clock, ListenerId, PresenceMapping, RoomId};
use crate::error::{StoreError, TransportError};
use crate::store::{MemoryPresenceStore, PresenceStore, VersionToken, Versioned};
use crate::transport::{ChannelHandle, Transport};

/// Manually driven [`Clock`].
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub(crate) fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    /// Moves the clock forward by `delta`.
    pub(crate) fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Transport that records every call and can fail sends to chosen
/// addresses.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    created: Mutex<Vec<ChannelAddress>>,
    sent: Mutex<Vec<(ChannelAddress, String)>>,
    failing: HashSet<ChannelAddress>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sends to `address` will fail with [`TransportError::UnknownChannel`].
    pub(crate) fn failing_for(mut self, address: ChannelAddress) -> Self {
        self.failing.insert(address);
        self
    }

    pub(crate) async fn created(&self) -> Vec<ChannelAddress> {
        self.created.lock().await.clone()
    }

    pub(crate) async fn sent(&self) -> Vec<(ChannelAddress, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn create_channel(
        &self,
        address: &ChannelAddress,
    ) -> Result<ChannelHandle, TransportError> {
        self.created.lock().await.push(address.clone());
        Ok(ChannelHandle::new(format!("token-{address}")))
    }

    async fn send(&self, address: &ChannelAddress, payload: String) -> Result<(), TransportError> {
        if self.failing.contains(address) {
            return Err(TransportError::UnknownChannel(address.to_string()));
        }
        self.sent.lock().await.push((address.clone(), payload));
        Ok(())
    }
}

/// Store whose backend is always down.
#[derive(Debug, Default)]
pub(crate) struct UnavailableStore;

#[async_trait]
impl PresenceStore for UnavailableStore {
    async fn get(&self, _room: &RoomId) -> Result<Option<PresenceMapping>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn get_for_update(&self, _room: &RoomId) -> Result<Option<Versioned>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn compare_and_swap(
        &self,
        _room: &RoomId,
        _version: VersionToken,
        _mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set_if_absent(
        &self,
        _room: &RoomId,
        _mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Store that lets a rival writer commit just before each of the first
/// `rival_writes` compare-and-swaps, forcing them to conflict.
///
/// Rival writes add listeners named `rival-0`, `rival-1`, ….
#[derive(Debug)]
pub(crate) struct ConflictingStore {
    inner: MemoryPresenceStore,
    rival_writes_left: AtomicU32,
    rivals_committed: AtomicU32,
    cas_calls: AtomicU32,
}

impl ConflictingStore {
    pub(crate) fn new(rival_writes: u32) -> Self {
        Self {
            inner: MemoryPresenceStore::new(),
            rival_writes_left: AtomicU32::new(rival_writes),
            rivals_committed: AtomicU32::new(0),
            cas_calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn cas_calls(&self) -> u32 {
        self.cas_calls.load(Ordering::SeqCst)
    }

    async fn rival_write(&self, room: &RoomId) -> Result<(), StoreError> {
        let n = self.rivals_committed.fetch_add(1, Ordering::SeqCst);
        let rival = ListenerId::new(format!("rival-{n}"));
        if let Some(mut current) = self.inner.get_for_update(room).await? {
            current.mapping.touch(rival, Utc::now());
            let _ = self
                .inner
                .compare_and_swap(room, current.version, &current.mapping)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceStore for ConflictingStore {
    async fn get(&self, room: &RoomId) -> Result<Option<PresenceMapping>, StoreError> {
        self.inner.get(room).await
    }

    async fn get_for_update(&self, room: &RoomId) -> Result<Option<Versioned>, StoreError> {
        self.inner.get_for_update(room).await
    }

    async fn compare_and_swap(
        &self,
        room: &RoomId,
        version: VersionToken,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        let rival_due = self
            .rival_writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if rival_due {
            self.rival_write(room).await?;
        }
        self.inner.compare_and_swap(room, version, mapping).await
    }

    async fn set_if_absent(
        &self,
        room: &RoomId,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        self.inner.set_if_absent(room, mapping).await
    }
}

/// Store that holds the first `parties` versioned reads at a barrier so
/// they all observe the same state, and counts winning creates.
#[derive(Debug)]
pub(crate) struct LockstepStore {
    inner: MemoryPresenceStore,
    barrier: Barrier,
    parties: usize,
    reads: AtomicUsize,
    creates_won: AtomicUsize,
    creates_lost: AtomicUsize,
}

impl LockstepStore {
    pub(crate) fn new(parties: usize) -> Self {
        Self {
            inner: MemoryPresenceStore::new(),
            barrier: Barrier::new(parties),
            parties,
            reads: AtomicUsize::new(0),
            creates_won: AtomicUsize::new(0),
            creates_lost: AtomicUsize::new(0),
        }
    }

    pub(crate) fn creates_won(&self) -> usize {
        self.creates_won.load(Ordering::SeqCst)
    }

    pub(crate) fn creates_lost(&self) -> usize {
        self.creates_lost.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresenceStore for LockstepStore {
    async fn get(&self, room: &RoomId) -> Result<Option<PresenceMapping>, StoreError> {
        self.inner.get(room).await
    }

    async fn get_for_update(&self, room: &RoomId) -> Result<Option<Versioned>, StoreError> {
        let read = self.inner.get_for_update(room).await;
        if self.reads.fetch_add(1, Ordering::SeqCst) < self.parties {
            self.barrier.wait().await;
        }
        read
    }

    async fn compare_and_swap(
        &self,
        room: &RoomId,
        version: VersionToken,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        self.inner.compare_and_swap(room, version, mapping).await
    }

    async fn set_if_absent(
        &self,
        room: &RoomId,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        let won = self.inner.set_if_absent(room, mapping).await?;
        if won {
            self.creates_won.fetch_add(1, Ordering::SeqCst);
        } else {
            self.creates_lost.fetch_add(1, Ordering::SeqCst);
        }
        Ok(won)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_from_start() {
        let start = DateTime::from_timestamp(1_000, 0).unwrap_or_default();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(TimeDelta::seconds(90));
        assert_eq!(clock.now().timestamp(), 1_090);
    }
}
