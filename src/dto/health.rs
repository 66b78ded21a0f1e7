use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    /// Whether the durable game store answered its ping.
    pub game_store: bool,
    /// Whether the session snapshot store answered its ping.
    pub session_store: bool,
}

impl HealthResponse {
    pub fn from_checks(game_store: bool, session_store: bool) -> Self {
        let status = if game_store && session_store {
            "ok"
        } else {
            "degraded"
        };
        Self {
            status: status.to_string(),
            game_store,
            session_store,
        }
    }
}
