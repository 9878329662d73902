//! WebSocket layer: the client end of a push channel.
//!
//! A client presents the token obtained from `/api/get-token` at
//! `/ws?token=…` and then receives every envelope addressed to its
//! channel. The socket is push-only; client frames other than close are
//! ignored.

pub mod connection;
pub mod handler;
