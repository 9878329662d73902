//! Gateway error types with HTTP status code mapping.
//!
//! [`StoreError`] and [`TransportError`] are raised by the two external
//! collaborators (presence store and push transport). [`GatewayError`] is
//! the central error type for request handling; each variant maps to a
//! specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "presence store unavailable: connection refused",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Failure reported by a presence store.
///
/// CAS conflicts are not errors: they are reported as `Ok(false)` by
/// [`crate::store::PresenceStore::compare_and_swap`] and
/// [`crate::store::PresenceStore::set_if_absent`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backing store unreachable or timed out. Safe to retry later.
    #[error("presence store unavailable: {0}")]
    Unavailable(String),

    /// Registration gave up after too many CAS conflicts.
    #[error("presence update for room {room} abandoned after {attempts} conflicting writes")]
    ContentionExhausted {
        /// Room whose entry stayed contended.
        room: String,
        /// Number of CAS conflicts observed.
        attempts: u32,
    },

    /// Stored value could not be decoded as a presence mapping.
    #[error("corrupt presence entry: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns `true` if the same operation may succeed when retried later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::ContentionExhausted { .. })
    }
}

/// Failure reported by the push transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No channel has been created for the address.
    #[error("no channel for address {0}")]
    UnknownChannel(String),

    /// The channel token presented by a client is not known.
    #[error("unknown channel token")]
    UnknownToken,

    /// Payload could not be encoded for delivery, or is too large for
    /// the transport.
    #[error("payload rejected: {0}")]
    Payload(String),

    /// Shared channel registry unreachable.
    #[error("push transport unavailable: {0}")]
    Unavailable(String),
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                 |
/// |-----------|-----------------|-----------------------------|
/// | 1000–1999 | Validation      | 400 / 401                   |
/// | 2000–2999 | Not Found       | 404 Not Found               |
/// | 3000–3999 | Server          | 500 / 503                   |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request carried no client identity cookie.
    #[error("missing client identity")]
    MissingIdentity,

    /// Presence store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Push transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::MissingIdentity => 1002,
            Self::Transport(TransportError::UnknownChannel(_)) => 2001,
            Self::Transport(TransportError::UnknownToken) => 2002,
            Self::Store(StoreError::Unavailable(_)) => 3001,
            Self::Store(StoreError::ContentionExhausted { .. }) => 3002,
            Self::Store(StoreError::Corrupt(_)) => 3003,
            Self::Transport(TransportError::Payload(_)) => 3004,
            Self::Transport(TransportError::Unavailable(_)) => 3005,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingIdentity => StatusCode::UNAUTHORIZED,
            Self::Transport(TransportError::UnknownChannel(_) | TransportError::UnknownToken) => {
                StatusCode::NOT_FOUND
            }
            Self::Store(StoreError::Unavailable(_) | StoreError::ContentionExhausted { .. })
            | Self::Transport(TransportError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(StoreError::Corrupt(_))
            | Self::Transport(TransportError::Payload(_))
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
