//! Composite transport address for one listener in one room.

use std::fmt;

use super::{ListenerId, RoomId};

/// Address of the push channel serving `listener` in `room`.
///
/// Encoded as `"{len}:{listener}/{room}"` where `len` is the byte length of
/// the listener id. The length prefix keeps the encoding injective even
/// when ids or room names contain `/` or `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelAddress(String);

impl ChannelAddress {
    /// Builds the address for `listener` in `room`.
    #[must_use]
    pub fn new(listener: &ListenerId, room: &RoomId) -> Self {
        Self(format!(
            "{}:{}/{}",
            listener.as_str().len(),
            listener.as_str(),
            room.as_str()
        ))
    }

    /// Wraps an address previously produced by [`ChannelAddress::new`],
    /// as read back from a shared channel registry.
    #[must_use]
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Returns the encoded address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
