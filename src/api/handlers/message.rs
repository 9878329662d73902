//! Message delivery: room broadcast and directed send.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Form, Json, Router};

use crate::api::dto::{MessageForm, MessageResponse};
use crate::api::identity;
use crate::app_state::AppState;
use crate::domain::{ListenerId, RoomId};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /api/message` — Broadcast to every other live member of a room.
///
/// # Errors
///
/// Returns [`GatewayError::MissingIdentity`] without a `uid` cookie,
/// [`GatewayError::InvalidRequest`] on malformed `message` JSON, and
/// [`GatewayError::Store`] if the room's presence cannot be read.
#[utoipa::path(
    post,
    path = "/api/message",
    tag = "Messages",
    summary = "Broadcast a message",
    description = "Delivers the message to every live listener in the room except the sender. Delivery is best effort; an empty room is not an error.",
    request_body(content = MessageForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 202, description = "Fan-out attempted", body = MessageResponse),
        (status = 400, description = "Malformed message", body = ErrorResponse),
        (status = 401, description = "Missing identity cookie", body = ErrorResponse),
        (status = 503, description = "Presence store unavailable", body = ErrorResponse),
    )
)]
pub async fn broadcast_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<MessageForm>,
) -> Result<impl IntoResponse, GatewayError> {
    deliver(&state, &headers, None, form).await
}

/// `POST /api/message/{to}` — Send to one listener.
///
/// # Errors
///
/// Same as [`broadcast_message`], plus the transport error if the
/// recipient has no channel in the room.
#[utoipa::path(
    post,
    path = "/api/message/{to}",
    tag = "Messages",
    summary = "Send a direct message",
    description = "Delivers the message to a single listener's channel in the room without consulting presence.",
    params(
        ("to" = String, Path, description = "Recipient listener id"),
    ),
    request_body(content = MessageForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 202, description = "Message handed to the transport", body = MessageResponse),
        (status = 400, description = "Malformed message", body = ErrorResponse),
        (status = 401, description = "Missing identity cookie", body = ErrorResponse),
        (status = 404, description = "Recipient has no channel in the room", body = ErrorResponse),
    )
)]
pub async fn direct_message(
    State(state): State<AppState>,
    Path(to): Path<String>,
    headers: HeaderMap,
    Form(form): Form<MessageForm>,
) -> Result<impl IntoResponse, GatewayError> {
    deliver(&state, &headers, Some(ListenerId::new(to)), form).await
}

async fn deliver(
    state: &AppState,
    headers: &HeaderMap,
    to: Option<ListenerId>,
    form: MessageForm,
) -> Result<(StatusCode, Json<MessageResponse>), GatewayError> {
    let from = identity::listener_from_headers(headers).ok_or(GatewayError::MissingIdentity)?;
    let message = form
        .decoded_message()
        .map_err(|e| GatewayError::InvalidRequest(format!("message is not valid JSON: {e}")))?;
    let room = RoomId::or_default(form.room);

    let report = state
        .relay
        .post_message(&from, to.as_ref(), &room, &message)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(MessageResponse::from(report))))
}

/// Message routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/message", post(broadcast_message))
        .route("/message/{to}", post(direct_message))
}
