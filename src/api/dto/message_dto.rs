//! DTOs for message delivery.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::service::BroadcastReport;

/// Form body for `POST /api/message` and `POST /api/message/{to}`.
///
/// `message` is a JSON document encoded as a string, as sent by browser
/// form posts. It is decoded before delivery.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MessageForm {
    /// Room to deliver in. Defaults to `"default"`.
    #[serde(default)]
    pub room: Option<String>,
    /// JSON-encoded message. Defaults to `{}`.
    #[serde(default)]
    pub message: Option<String>,
}

impl MessageForm {
    /// Decodes the `message` field, defaulting to an empty object.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if `message` is present but malformed.
    pub fn decoded_message(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self.message.as_deref() {
            Some(raw) => serde_json::from_str(raw),
            None => Ok(serde_json::Value::Object(serde_json::Map::new())),
        }
    }
}

/// Response body for message endpoints (202 Accepted).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    /// Recipients the transport accepted.
    pub delivered: usize,
    /// Recipients whose delivery failed.
    pub failed: usize,
}

impl From<BroadcastReport> for MessageResponse {
    fn from(report: BroadcastReport) -> Self {
        Self {
            delivered: report.delivered,
            failed: report.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_message_is_empty_object() {
        let form = MessageForm::default();
        assert_eq!(form.decoded_message().ok(), Some(serde_json::json!({})));
    }

    #[test]
    fn malformed_message_is_rejected() {
        let form = MessageForm {
            room: None,
            message: Some("{not json".into()),
        };
        assert!(form.decoded_message().is_err());
    }
}
