//! Cookie-based client identity.
//!
//! Each browser keeps a stable listener id in the `uid` cookie. The token
//! endpoint mints one on first contact; every other endpoint only reads it.

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};

use crate::domain::ListenerId;
use crate::error::GatewayError;

/// Name of the identity cookie.
pub const IDENTITY_COOKIE: &str = "uid";

/// Extracts the listener id from the request's `Cookie` headers.
///
/// Empty values are treated as absent.
#[must_use]
pub fn listener_from_headers(headers: &HeaderMap) -> Option<ListenerId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == IDENTITY_COOKIE && !value.is_empty())
        .map(|(_, value)| ListenerId::new(value))
}

/// Builds the `Set-Cookie` value persisting `listener` in the browser.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if the id contains bytes that are
/// not valid in a header.
pub fn identity_cookie(listener: &ListenerId) -> Result<HeaderValue, GatewayError> {
    HeaderValue::from_str(&format!(
        "{IDENTITY_COOKIE}={listener}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .map_err(|e| GatewayError::Internal(format!("identity cookie: {e}")))
}
