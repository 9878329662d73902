//! Per-room presence mapping and TTL arithmetic.
//!
//! A [`PresenceMapping`] is the whole value stored under one room key:
//! every listener that registered in the room, with the time it last did
//! so. The mapping is always replaced as a unit, never patched in place
//! inside the store.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::ListenerId;

/// Default presence time-to-live in seconds.
pub const DEFAULT_PRESENCE_TTL_SECS: i64 = 3600;

/// Returns `true` if an entry last seen at `last_seen` has expired.
///
/// The comparison is strict: an entry exactly `ttl` old is still live.
#[must_use]
pub fn is_stale(last_seen: DateTime<Utc>, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
    now.checked_sub_signed(ttl)
        .is_some_and(|cutoff| last_seen < cutoff)
}

/// `listener-id → last-activity` for a single room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresenceMapping(HashMap<ListenerId, DateTime<Utc>>);

impl PresenceMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mapping holding a single listener.
    #[must_use]
    pub fn with_listener(listener: ListenerId, seen_at: DateTime<Utc>) -> Self {
        let mut mapping = Self::new();
        mapping.touch(listener, seen_at);
        mapping
    }

    /// Inserts `listener` or refreshes its last-activity time.
    pub fn touch(&mut self, listener: ListenerId, seen_at: DateTime<Utc>) {
        self.0.insert(listener, seen_at);
    }

    /// Removes every stale entry and returns the ids that were dropped.
    pub fn prune_stale(&mut self, now: DateTime<Utc>, ttl: TimeDelta) -> Vec<ListenerId> {
        let expired: Vec<ListenerId> = self
            .0
            .iter()
            .filter(|(_, seen)| is_stale(**seen, now, ttl))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.0.remove(id);
        }
        expired
    }

    /// Iterates over listeners that are not stale at `now`.
    ///
    /// Stale entries are skipped, not removed.
    pub fn live_listeners(
        &self,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> impl Iterator<Item = &ListenerId> {
        self.0
            .iter()
            .filter(move |(_, seen)| !is_stale(**seen, now, ttl))
            .map(|(id, _)| id)
    }

    /// Last-activity time of `listener`, if present.
    #[must_use]
    pub fn last_seen(&self, listener: &ListenerId) -> Option<DateTime<Utc>> {
        self.0.get(listener).copied()
    }

    /// Returns `true` if `listener` has an entry (stale or not).
    #[must_use]
    pub fn contains(&self, listener: &ListenerId) -> bool {
        self.0.contains_key(listener)
    }

    /// Number of entries, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the mapping has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn ttl() -> TimeDelta {
        TimeDelta::seconds(DEFAULT_PRESENCE_TTL_SECS)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        let Some(t) = DateTime::from_timestamp(secs, 0) else {
            panic!("valid timestamp");
        };
        t
    }

    #[test]
    fn staleness_is_strict() {
        let now = at(10_000);
        assert!(!is_stale(at(10_000 - 3600), now, ttl()));
        assert!(is_stale(at(10_000 - 3601), now, ttl()));
        assert!(!is_stale(now, now, ttl()));
    }

    #[test]
    fn touch_refreshes_without_duplicating() {
        let mut mapping = PresenceMapping::with_listener("alice".into(), at(100));
        mapping.touch("alice".into(), at(200));
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.last_seen(&"alice".into()), Some(at(200)));
    }

    #[test]
    fn prune_drops_only_expired_entries() {
        let mut mapping = PresenceMapping::new();
        mapping.touch("old".into(), at(0));
        mapping.touch("fresh".into(), at(9_000));

        let dropped = mapping.prune_stale(at(10_000), ttl());
        assert_eq!(dropped, vec![ListenerId::from("old")]);
        assert!(!mapping.contains(&"old".into()));
        assert!(mapping.contains(&"fresh".into()));
    }

    #[test]
    fn live_listeners_skips_but_keeps_stale() {
        let mut mapping = PresenceMapping::new();
        mapping.touch("old".into(), at(0));
        mapping.touch("fresh".into(), at(9_000));

        let live: Vec<&ListenerId> = mapping.live_listeners(at(10_000), ttl()).collect();
        assert_eq!(live, vec![&ListenerId::from("fresh")]);
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn serializes_as_plain_object() {
        let mapping = PresenceMapping::with_listener("alice".into(), at(0));
        let Ok(value) = serde_json::to_value(&mapping) else {
            panic!("serialization failed");
        };
        assert!(value.get("alice").is_some());
    }
}
