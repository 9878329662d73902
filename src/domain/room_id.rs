//! Room names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Room used when a request does not name one.
pub const DEFAULT_ROOM: &str = "default";

/// Name of a room scoping a group of listeners.
///
/// Rooms have no lifecycle of their own: a room exists while the presence
/// store holds an entry under its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a room name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Resolves an optional request parameter, falling back to
    /// [`DEFAULT_ROOM`].
    #[must_use]
    pub fn or_default(name: Option<String>) -> Self {
        name.map_or_else(Self::default, Self)
    }

    /// Returns the room name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self(DEFAULT_ROOM.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_falls_back_to_default() {
        assert_eq!(RoomId::or_default(None).as_str(), "default");
        assert_eq!(RoomId::or_default(Some("lobby".into())).as_str(), "lobby");
    }
}
