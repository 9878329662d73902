//! Channel token issuance: join a room and obtain a push channel.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{TokenQuery, TokenResponse};
use crate::api::identity;
use crate::app_state::AppState;
use crate::domain::{ListenerId, RoomId};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /api/get-token` — Join a room and receive a channel token.
///
/// Reuses the listener id from the `uid` cookie, or mints one and sets the
/// cookie on the response.
///
/// # Errors
///
/// Returns [`GatewayError::Store`] when the presence store is unavailable
/// or too contended; no token is issued in that case.
#[utoipa::path(
    get,
    path = "/api/get-token",
    tag = "Presence",
    summary = "Join a room",
    description = "Registers the caller's presence in a room and returns the token for its push channel. Sets the `uid` identity cookie on first contact.",
    params(TokenQuery),
    responses(
        (status = 200, description = "Presence recorded, channel open", body = TokenResponse),
        (status = 503, description = "Presence store unavailable", body = ErrorResponse),
    )
)]
pub async fn get_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let (listener, minted) = match identity::listener_from_headers(&headers) {
        Some(listener) => (listener, false),
        None => (ListenerId::generate(), true),
    };
    let room = RoomId::or_default(query.room);

    let handle = state.relay.join(&listener, &room).await?;

    let mut response = Json(TokenResponse {
        token: handle.into_token(),
    })
    .into_response();
    if minted {
        response
            .headers_mut()
            .insert(SET_COOKIE, identity::identity_cookie(&listener)?);
    }
    Ok(response)
}

/// Presence routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/get-token", get(get_token))
}
