//! OpenAPI document for the REST surface.

use super::handlers::{message, system, token};

/// Generated OpenAPI description, served by Swagger UI when the
/// `swagger-ui` feature is enabled.
#[derive(Debug, utoipa::OpenApi)]
#[openapi(
    info(title = "roomcast-gateway", description = "Room presence and message relay"),
    tags(
        (name = "Presence", description = "Joining rooms and obtaining push channels"),
        (name = "Messages", description = "Room broadcast and directed messages"),
        (name = "System", description = "Service health"),
    ),
    paths(
        token::get_token,
        message::broadcast_message,
        message::direct_message,
        system::health_handler,
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/api/get-token", "/api/message", "/api/message/{to}", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
