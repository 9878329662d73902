//! Presence store: versioned per-room presence mappings.
//!
//! [`PresenceStore`] is the capability the registrar and broadcaster share.
//! It exposes plain reads, versioned reads, and two conditional writes
//! (compare-and-swap and set-if-absent). Callers never lock a room entry;
//! concurrent writers race on the conditional writes and losers re-read.
//!
//! Two implementations ship with the gateway:
//!
//! - [`MemoryPresenceStore`] — single-process, for development and tests.
//! - [`PostgresPresenceStore`] — shared across gateway instances.

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::domain::{PresenceMapping, RoomId};
use crate::error::StoreError;

pub use memory::MemoryPresenceStore;
pub use postgres::PostgresPresenceStore;

/// Opaque version of a stored room entry.
///
/// Obtained from [`PresenceStore::get_for_update`] and handed back to
/// [`PresenceStore::compare_and_swap`]. Only meaningful to the store that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionToken(i64);

impl VersionToken {
    /// Wraps a raw version number.
    #[must_use]
    pub const fn new(version: i64) -> Self {
        Self(version)
    }

    /// Returns the raw version number.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

/// A presence mapping together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    /// Mapping as committed at `version`.
    pub mapping: PresenceMapping,
    /// Token for a subsequent compare-and-swap.
    pub version: VersionToken,
}

/// Shared directory of room presence mappings.
///
/// # Errors
///
/// Every method returns [`StoreError::Unavailable`] when the backing store
/// cannot be reached. A missing room is `Ok(None)`, never an error.
#[async_trait]
pub trait PresenceStore: Send + Sync + fmt::Debug {
    /// Reads a recently committed mapping for `room`.
    async fn get(&self, room: &RoomId) -> Result<Option<PresenceMapping>, StoreError>;

    /// Reads the mapping for `room` with a version token for CAS.
    async fn get_for_update(&self, room: &RoomId) -> Result<Option<Versioned>, StoreError>;

    /// Replaces the mapping iff the entry is still at `version`.
    ///
    /// Returns `Ok(false)` without writing when another writer committed
    /// first or the entry no longer exists.
    async fn compare_and_swap(
        &self,
        room: &RoomId,
        version: VersionToken,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError>;

    /// Creates the entry for `room` iff none exists.
    ///
    /// Returns `Ok(false)` without writing when the entry already exists.
    async fn set_if_absent(
        &self,
        room: &RoomId,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError>;
}
