//! DTO definitions used by the operator command API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Body shared by every `/manage/{command}/{gameId}` call.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    /// Secret of the addressed game.
    #[validate(length(min = 1, message = "gameSecret must not be empty"))]
    pub game_secret: String,
}

/// Envelope wrapping the outcome of an operator command.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandResponse<T> {
    pub status: u16,
    pub status_text: String,
    pub content: T,
}

impl<T> CommandResponse<T> {
    /// Successful command outcome.
    pub fn ok(content: T) -> Self {
        Self {
            status: 200,
            status_text: "OK".into(),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_is_rejected() {
        let request: CommandRequest = serde_json::from_str(r#"{"gameSecret": ""}"#).unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("game_secret"));
    }

    #[test]
    fn envelope_carries_ok_status() {
        let json = serde_json::to_value(CommandResponse::ok(7)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": 200, "status_text": "OK", "content": 7})
        );
    }
}
