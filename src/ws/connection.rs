//! WebSocket connection loop.
//!
//! Forwards payloads from one push channel to the socket until either side
//! goes away.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::domain::ChannelAddress;
use crate::transport::ChannelSource;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Forwards every payload from the [`broadcast::Receiver`] as a text
///   frame.
/// - Drains client frames so close and ping handling keep working.
/// - Detaches from `channels` on exit so the channel's idle timer restarts.
pub async fn run_connection(
    socket: WebSocket,
    address: ChannelAddress,
    mut payload_rx: broadcast::Receiver<String>,
    channels: Arc<dyn ChannelSource>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%address, error = %e, "ws read failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            payload = payload_rx.recv() => {
                match payload {
                    Ok(json) => {
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%address, lagged = n, "ws client lagged behind its channel");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    drop(payload_rx);
    channels.detach(&address).await;
    tracing::debug!(%address, "ws connection closed");
}
