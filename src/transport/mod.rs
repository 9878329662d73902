//! Push transport: per-listener delivery channels.
//!
//! The core only needs two primitives from a transport: open a channel for
//! an address and push a payload to an address. [`ChannelHub`] provides
//! both in-process and hands channels to WebSocket clients by token.
//! [`PostgresTransport`] shares channels between gateway instances through
//! a registry table and `LISTEN`/`NOTIFY`, delivering into each instance's
//! local hub.

pub mod hub;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::ChannelAddress;
use crate::error::TransportError;

pub use hub::ChannelHub;
pub use postgres::PostgresTransport;

/// Opaque handle a registered listener uses to connect to its channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChannelHandle(String);

impl ChannelHandle {
    /// Wraps a channel token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token string.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Consumes the handle, returning the token string.
    #[must_use]
    pub fn into_token(self) -> String {
        self.0
    }
}

/// Delivery primitives of a push transport.
///
/// # Errors
///
/// Both operations may fail with a [`TransportError`]; callers decide
/// whether a failure is fatal.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Opens (or reopens) the channel for `address`.
    async fn create_channel(&self, address: &ChannelAddress)
    -> Result<ChannelHandle, TransportError>;

    /// Pushes `payload` to the channel at `address`.
    async fn send(&self, address: &ChannelAddress, payload: String) -> Result<(), TransportError>;
}

/// Client side of a transport: where WebSocket connections pick up the
/// channel their token was issued for.
#[async_trait]
pub trait ChannelSource: Send + Sync + fmt::Debug {
    /// Resolves `token` and subscribes a receiver to its channel.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownToken`] for tokens never issued or
    /// already expired.
    async fn attach(
        &self,
        token: &str,
    ) -> Result<(ChannelAddress, broadcast::Receiver<String>), TransportError>;

    /// Marks the client of `address` as gone; the channel's idle timer
    /// starts again.
    async fn detach(&self, address: &ChannelAddress);

    /// Number of channels open in this process.
    async fn channel_count(&self) -> usize;
}
