use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{routes::identity::ParticipantId, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "participants",
    params(
        ("x-user-id" = Option<i64>, Header, description = "Participant id set by the gateway"),
        ("userId" = Option<i64>, Query, description = "Participant id when no header can be set"),
    ),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "No participant identity", body = crate::error::ErrorBody),
    )
)]
/// Upgrade the HTTP connection into a participant WebSocket session.
///
/// The identity is checked before the upgrade so anonymous handshakes never reach the socket.
pub async fn ws_handler(
    State(state): State<SharedState>,
    ParticipantId(user_id): ParticipantId,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, user_id))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
