use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};

use crate::{
    dto::session::{AnswerCheckRequest, AnswerCheckResponse, SessionView},
    error::AppError,
    routes::{identity::ParticipantId, validated},
    services::{answer_service, session_service},
    state::SharedState,
};

/// Participant HTTP calls complementing the WebSocket channel.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/answer-check", post(answer_check))
        .route("/game/session", get(session))
}

/// Confirm the caller's answer to the current question and report the frozen result.
#[utoipa::path(
    post,
    path = "/game/answer-check",
    tag = "game",
    params(("x-user-id" = i64, Header, description = "Participant id set by the gateway")),
    request_body = AnswerCheckRequest,
    responses(
        (status = 200, description = "Answer confirmed", body = AnswerCheckResponse),
        (status = 401, description = "No participant identity", body = crate::error::ErrorBody),
        (status = 409, description = "No question to confirm", body = crate::error::ErrorBody),
    )
)]
pub async fn answer_check(
    State(state): State<SharedState>,
    ParticipantId(user_id): ParticipantId,
    payload: Result<Json<AnswerCheckRequest>, JsonRejection>,
) -> Result<Json<AnswerCheckResponse>, AppError> {
    let request = validated(payload)?;
    let response = answer_service::confirm_answer(&state, request.game_id, user_id).await?;
    Ok(Json(response))
}

/// Current session snapshot, for participants joining late.
#[utoipa::path(
    get,
    path = "/game/session",
    tag = "game",
    responses(
        (status = 200, description = "Live session", body = SessionView),
        (status = 404, description = "No game is running", body = crate::error::ErrorBody),
    )
)]
pub async fn session(State(state): State<SharedState>) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::current_session(&state).await?))
}
