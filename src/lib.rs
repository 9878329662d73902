//! # roomcast-gateway
//!
//! Room presence registry and message relay for browser clients.
//!
//! Clients join a room over HTTP and receive a token for a personal push
//! channel, which they open as a WebSocket. Messages posted to a room are
//! fanned out to every member seen within the presence TTL, or sent to a
//! single member directly. Presence is shared between instances through a
//! versioned store updated with optimistic compare-and-swap.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── RelayService (service/)
//!     │     ├── ListenerRegistrar ── PresenceStore (store/)
//!     │     ├── Broadcaster
//!     │     └── DirectedSender ───── Transport (transport/)
//!     │
//!     └── Memory or PostgreSQL presence
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
pub mod transport;
pub mod ws;

#[cfg(test)]
mod testing;
