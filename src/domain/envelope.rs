//! Wire envelope pushed to a listener's channel.

use serde::{Deserialize, Serialize};

use super::ListenerId;

/// Message as delivered to a recipient.
///
/// Serialized as `{"message": …, "from": "…", "to": "…"}`. `message` is
/// the caller's pre-decoded JSON value, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Application payload.
    pub message: serde_json::Value,
    /// Sender listener id.
    pub from: ListenerId,
    /// Recipient listener id.
    pub to: ListenerId,
}

impl Envelope {
    /// Builds an envelope from `from` to `to`.
    #[must_use]
    pub fn new(message: serde_json::Value, from: ListenerId, to: ListenerId) -> Self {
        Self { message, from, to }
    }
}
