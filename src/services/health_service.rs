use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping both stores and report which ones answered.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let game_store = match state.durable(state.game_store().health_check()).await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "game store health check failed");
            false
        }
    };
    let session_store = match state.sessions().health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "session store health check failed");
            false
        }
    };
    HealthResponse::from_checks(game_store, session_store)
}
