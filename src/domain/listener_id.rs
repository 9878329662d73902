//! Type-safe listener identifier.
//!
//! [`ListenerId`] is a newtype around the opaque string a client presents
//! as its identity. The gateway never interprets the contents; it only
//! compares, hashes and echoes them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a client listening in one or more rooms.
///
/// Usually a UUID v4 minted by the token endpoint and persisted in the
/// client's `uid` cookie, but any non-empty string supplied by the
/// identity layer is accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(String);

impl ListenerId {
    /// Wraps an existing identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh random identifier (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListenerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ListenerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn generate_yields_unique_uuids() {
        let a = ListenerId::generate();
        let b = ListenerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = ListenerId::new("alice");
        let Ok(json) = serde_json::to_string(&id) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"alice\"");
    }

    #[test]
    fn display_is_raw_value() {
        assert_eq!(ListenerId::from("bob").to_string(), "bob");
    }
}
