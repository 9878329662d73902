//! In-process presence store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PresenceStore, VersionToken, Versioned};
use crate::domain::{PresenceMapping, RoomId};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Entries {
    rooms: HashMap<RoomId, Versioned>,
    /// Last version handed out. Store-wide so a token can never be reused.
    last_version: i64,
}

impl Entries {
    fn next_version(&mut self) -> VersionToken {
        self.last_version = self.last_version.saturating_add(1);
        VersionToken::new(self.last_version)
    }
}

/// [`PresenceStore`] held in process memory.
///
/// Every operation takes the single map lock for the duration of one
/// read or one conditional write, so each CAS is atomic with respect to
/// all other callers in the process. State is lost on restart and is not
/// shared between gateway instances.
#[derive(Debug, Default)]
pub struct MemoryPresenceStore {
    entries: RwLock<Entries>,
}

impl MemoryPresenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn room_count(&self) -> usize {
        self.entries.read().await.rooms.len()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn get(&self, room: &RoomId) -> Result<Option<PresenceMapping>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.rooms.get(room).map(|v| v.mapping.clone()))
    }

    async fn get_for_update(&self, room: &RoomId) -> Result<Option<Versioned>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.rooms.get(room).cloned())
    }

    async fn compare_and_swap(
        &self,
        room: &RoomId,
        version: VersionToken,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let current = entries.rooms.get(room).map(|v| v.version);
        if current != Some(version) {
            return Ok(false);
        }
        let version = entries.next_version();
        entries.rooms.insert(
            room.clone(),
            Versioned {
                mapping: mapping.clone(),
                version,
            },
        );
        Ok(true)
    }

    async fn set_if_absent(
        &self,
        room: &RoomId,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        if entries.rooms.contains_key(room) {
            return Ok(false);
        }
        let version = entries.next_version();
        entries.rooms.insert(
            room.clone(),
            Versioned {
                mapping: mapping.clone(),
                version,
            },
        );
        Ok(true)
    }
}
