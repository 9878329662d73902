//! DTOs for channel token issuance.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for `GET /api/get-token`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    /// Room to join. Defaults to `"default"`.
    #[serde(default)]
    pub room: Option<String>,
}

/// Response body for `GET /api/get-token`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// Opaque channel token to present at `/ws?token=…`.
    pub token: String,
}
