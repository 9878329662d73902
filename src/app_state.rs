//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::PresenceBackend;
use crate::service::RelayService;
use crate::transport::ChannelSource;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Joins and message delivery.
    pub relay: Arc<RelayService>,
    /// Push channels that WebSocket clients attach to.
    pub channels: Arc<dyn ChannelSource>,
    /// Active presence backend, reported by `/health`.
    pub presence_backend: PresenceBackend,
}
