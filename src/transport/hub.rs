//! In-process push channels keyed by [`ChannelAddress`].
//!
//! Each channel wraps a [`tokio::sync::broadcast`] channel. The registrar
//! opens channels through [`Transport::create_channel`], the WebSocket
//! handler attaches to them by token, and the senders push JSON payloads
//! through [`Transport::send`].
//!
//! A channel nobody is attached to expires once it has been idle for the
//! hub's TTL. Expired channels are swept whenever a channel is opened, so
//! the hub never holds more than the listeners active within one TTL plus
//! those currently connected.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{RwLock, broadcast};

use super::{ChannelHandle, ChannelSource, Transport};
use crate::domain::presence::DEFAULT_PRESENCE_TTL_SECS;
use crate::domain::{ChannelAddress, Clock, SystemClock, is_stale};
use crate::error::TransportError;

#[derive(Debug)]
struct Channel {
    token: String,
    sender: broadcast::Sender<String>,
    last_active: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Channels {
    by_address: HashMap<ChannelAddress, Channel>,
    by_token: HashMap<String, ChannelAddress>,
}

impl Channels {
    /// Opens `address` under `token`, or refreshes it if already open.
    /// Returns the token the channel is reachable by.
    fn open(
        &mut self,
        address: &ChannelAddress,
        token: String,
        capacity: usize,
        now: DateTime<Utc>,
    ) -> String {
        if let Some(existing) = self.by_address.get_mut(address) {
            existing.last_active = now;
            if existing.token == token {
                return token;
            }
            // A shared registry handed out a different token; it wins.
            self.by_token.remove(&existing.token);
            existing.token.clone_from(&token);
            self.by_token.insert(token.clone(), address.clone());
            return token;
        }

        let (sender, _) = broadcast::channel(capacity);
        self.by_token.insert(token.clone(), address.clone());
        self.by_address.insert(
            address.clone(),
            Channel {
                token: token.clone(),
                sender,
                last_active: now,
            },
        );
        tracing::debug!(%address, "channel opened");
        token
    }

    fn evict_idle(&mut self, now: DateTime<Utc>, idle_ttl: TimeDelta) -> usize {
        let before = self.by_address.len();
        let by_token = &mut self.by_token;
        self.by_address.retain(|address, channel| {
            let expired = channel.sender.receiver_count() == 0
                && is_stale(channel.last_active, now, idle_ttl);
            if expired {
                by_token.remove(&channel.token);
                tracing::debug!(%address, "idle channel expired");
            }
            !expired
        });
        before - self.by_address.len()
    }
}

/// Registry of live push channels.
///
/// Payloads sent while no client is attached are dropped. When a client
/// falls more than `capacity` payloads behind, the oldest are dropped for
/// that client.
#[derive(Debug)]
pub struct ChannelHub {
    channels: RwLock<Channels>,
    capacity: usize,
    idle_ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl ChannelHub {
    /// Creates an empty hub whose channels buffer up to `capacity` payloads
    /// and expire after the default presence TTL of inactivity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_expiry(
            capacity,
            TimeDelta::seconds(DEFAULT_PRESENCE_TTL_SECS),
            Arc::new(SystemClock),
        )
    }

    /// Creates an empty hub whose unattached channels expire once idle for
    /// longer than `idle_ttl`, measured by `clock`.
    #[must_use]
    pub fn with_expiry(capacity: usize, idle_ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            channels: RwLock::new(Channels::default()),
            capacity: capacity.max(1),
            idle_ttl,
            clock,
        }
    }

    /// Idle time after which an unattached channel expires.
    #[must_use]
    pub const fn idle_ttl(&self) -> TimeDelta {
        self.idle_ttl
    }

    /// Resolves a client token to its channel and subscribes a receiver.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownToken`] if no channel was issued
    /// for `token` or it has expired.
    pub async fn attach(
        &self,
        token: &str,
    ) -> Result<(ChannelAddress, broadcast::Receiver<String>), TransportError> {
        let now = self.clock.now();
        let mut channels = self.channels.write().await;
        let address = channels
            .by_token
            .get(token)
            .cloned()
            .ok_or(TransportError::UnknownToken)?;
        let channel = channels
            .by_address
            .get_mut(&address)
            .ok_or(TransportError::UnknownToken)?;
        channel.last_active = now;
        let receiver = channel.sender.subscribe();
        Ok((address, receiver))
    }

    /// Restarts the idle timer of `address` after a client disconnects.
    pub async fn detach(&self, address: &ChannelAddress) {
        let now = self.clock.now();
        if let Some(channel) = self.channels.write().await.by_address.get_mut(address) {
            channel.last_active = now;
        }
    }

    /// Opens `address` under a token issued elsewhere, keeping the hub in
    /// step with a shared channel registry.
    pub(crate) async fn open_with_token(&self, address: &ChannelAddress, token: &str) {
        let now = self.clock.now();
        let mut channels = self.channels.write().await;
        channels.open(address, token.to_owned(), self.capacity, now);
    }

    /// Pushes `payload` to the local channel reachable by `token`, if any.
    ///
    /// Returns the number of attached receivers that got it.
    pub(crate) async fn deliver(&self, token: &str, payload: String) -> usize {
        let channels = self.channels.read().await;
        channels
            .by_token
            .get(token)
            .and_then(|address| channels.by_address.get(address))
            .map_or(0, |channel| channel.sender.send(payload).unwrap_or(0))
    }

    /// Tokens of the channels that currently have a client attached.
    pub(crate) async fn attached_tokens(&self) -> Vec<String> {
        self.channels
            .read()
            .await
            .by_address
            .values()
            .filter(|channel| channel.sender.receiver_count() > 0)
            .map(|channel| channel.token.clone())
            .collect()
    }

    /// Removes every unattached channel idle for longer than the TTL.
    ///
    /// Returns the number of channels removed.
    pub async fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        self.channels.write().await.evict_idle(now, self.idle_ttl)
    }

    /// Number of open channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.by_address.len()
    }
}

#[async_trait]
impl Transport for ChannelHub {
    async fn create_channel(
        &self,
        address: &ChannelAddress,
    ) -> Result<ChannelHandle, TransportError> {
        let now = self.clock.now();
        let mut channels = self.channels.write().await;
        let expired = channels.evict_idle(now, self.idle_ttl);
        if expired > 0 {
            tracing::debug!(expired, "idle channels swept");
        }

        let token = match channels.by_address.get(address) {
            Some(existing) => existing.token.clone(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        Ok(ChannelHandle::new(
            channels.open(address, token, self.capacity, now),
        ))
    }

    async fn send(&self, address: &ChannelAddress, payload: String) -> Result<(), TransportError> {
        let channels = self.channels.read().await;
        let channel = channels
            .by_address
            .get(address)
            .ok_or_else(|| TransportError::UnknownChannel(address.to_string()))?;
        let receivers = channel.sender.send(payload).unwrap_or(0);
        if receivers == 0 {
            tracing::debug!(%address, "no client attached; payload dropped");
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelSource for ChannelHub {
    async fn attach(
        &self,
        token: &str,
    ) -> Result<(ChannelAddress, broadcast::Receiver<String>), TransportError> {
        Self::attach(self, token).await
    }

    async fn detach(&self, address: &ChannelAddress) {
        Self::detach(self, address).await;
    }

    async fn channel_count(&self) -> usize {
        Self::channel_count(self).await
    }
}
