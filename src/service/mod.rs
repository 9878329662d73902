//! Service layer: presence registration and message delivery.
//!
//! [`ListenerRegistrar`] maintains presence, [`Broadcaster`] and
//! [`DirectedSender`] deliver messages, and [`RelayService`] ties the three
//! together for the HTTP and WebSocket handlers.

pub mod broadcaster;
pub mod registrar;
pub mod relay_service;
pub mod sender;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use registrar::{ListenerRegistrar, RegistrarPolicy};
pub use relay_service::RelayService;
pub use sender::DirectedSender;
