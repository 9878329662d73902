//! Domain layer: identifiers, presence mappings, and delivery envelopes.
//!
//! This module contains the server-side domain model: listener and room
//! identity, the per-room presence mapping with its TTL rules, the
//! composite channel address used by the push transport, and the clock
//! that timestamps presence.

pub mod channel_address;
pub mod clock;
pub mod envelope;
pub mod listener_id;
pub mod presence;
pub mod room_id;

pub use channel_address::ChannelAddress;
pub use clock::{Clock, SystemClock};
pub use envelope::Envelope;
pub use listener_id::ListenerId;
pub use presence::{PresenceMapping, is_stale};
pub use room_id::RoomId;
