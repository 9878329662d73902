//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::error::GatewayError;
use crate::transport::ChannelSource;

/// Query parameters for `GET /ws`.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Channel token issued by `/api/get-token`.
    pub token: String,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The channel is resolved before the upgrade so payloads sent between the
/// handshake and the first poll are not lost.
///
/// # Errors
///
/// Returns a transport error (404) when the token was never issued.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let (address, payload_rx) = state.channels.attach(&query.token).await?;
    tracing::debug!(%address, "ws channel attached");

    let channels = std::sync::Arc::clone(&state.channels);
    Ok(ws.on_upgrade(move |socket| run_connection(socket, address, payload_rx, channels)))
}
