//! REST endpoint handlers organized by resource.

pub mod message;
pub mod system;
pub mod token;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(token::routes())
        .merge(message::routes())
}
