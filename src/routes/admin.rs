use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::post,
};

use crate::{
    dao::models::GameId,
    dto::{
        admin::{CommandRequest, CommandResponse},
        session::SessionView,
        ws::{AnswerStatsPayload, QuestionRefPayload, QuestionUpPayload, ResultPayload},
    },
    error::AppError,
    routes::validated,
    services::{answer_service, question_service, session_service},
    state::SharedState,
};

/// Operator commands, one `POST /manage/{command}/{gameId}` route each.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/manage/start/{game_id}", post(start))
        .route("/manage/stop/{game_id}", post(stop))
        .route("/manage/question-up/{game_id}", post(question_up))
        .route("/manage/question-down/{game_id}", post(question_down))
        .route("/manage/answer-up/{game_id}", post(answer_up))
        .route("/manage/answer-down/{game_id}", post(answer_down))
        .route("/manage/result-up/{game_id}", post(result_up))
        .route("/manage/result-down/{game_id}", post(result_down))
        .route("/manage/reset/{game_id}", post(reset))
}

/// Open the game to participants.
#[utoipa::path(
    post,
    path = "/manage/start/{game_id}",
    tag = "manage",
    params(("game_id" = i64, Path, description = "Identifier of the game")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Game started", body = CommandResponse<SessionView>),
        (status = 404, description = "Unknown game or wrong secret", body = crate::error::ErrorBody),
        (status = 409, description = "Command not allowed now", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid body", body = crate::error::ErrorBody),
    )
)]
pub async fn start(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse<SessionView>>, AppError> {
    let request = validated(payload)?;
    let content = session_service::start(&state, game_id, &request.game_secret).await?;
    Ok(Json(CommandResponse::ok(content)))
}

/// End the running game.
#[utoipa::path(
    post,
    path = "/manage/stop/{game_id}",
    tag = "manage",
    params(("game_id" = i64, Path, description = "Identifier of the game")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Game stopped", body = CommandResponse<SessionView>),
        (status = 404, description = "Unknown game or wrong secret", body = crate::error::ErrorBody),
        (status = 409, description = "Command not allowed now", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid body", body = crate::error::ErrorBody),
    )
)]
pub async fn stop(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse<SessionView>>, AppError> {
    let request = validated(payload)?;
    let content = session_service::stop(&state, game_id, &request.game_secret).await?;
    Ok(Json(CommandResponse::ok(content)))
}

/// Push the next question, or return the live one unchanged.
#[utoipa::path(
    post,
    path = "/manage/question-up/{game_id}",
    tag = "manage",
    params(("game_id" = i64, Path, description = "Identifier of the game")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Question live", body = CommandResponse<QuestionUpPayload>),
        (status = 404, description = "Unknown game or wrong secret", body = crate::error::ErrorBody),
        (status = 409, description = "Command not allowed now", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid body", body = crate::error::ErrorBody),
    )
)]
pub async fn question_up(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse<QuestionUpPayload>>, AppError> {
    let request = validated(payload)?;
    let content = question_service::push_question(&state, game_id, &request.game_secret).await?;
    Ok(Json(CommandResponse::ok(content)))
}

/// Retract the live question.
#[utoipa::path(
    post,
    path = "/manage/question-down/{game_id}",
    tag = "manage",
    params(("game_id" = i64, Path, description = "Identifier of the game")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Question retracted", body = CommandResponse<QuestionRefPayload>),
        (status = 404, description = "Unknown game or wrong secret", body = crate::error::ErrorBody),
        (status = 409, description = "Command not allowed now", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid body", body = crate::error::ErrorBody),
    )
)]
pub async fn question_down(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse<QuestionRefPayload>>, AppError> {
    let request = validated(payload)?;
    let content = question_service::retract_question(&state, game_id, &request.game_secret).await?;
    Ok(Json(CommandResponse::ok(content)))
}

/// Reveal the confirmed-answer statistics of the current question.
#[utoipa::path(
    post,
    path = "/manage/answer-up/{game_id}",
    tag = "manage",
    params(("game_id" = i64, Path, description = "Identifier of the game")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Statistics revealed", body = CommandResponse<AnswerStatsPayload>),
        (status = 404, description = "Unknown game or wrong secret", body = crate::error::ErrorBody),
        (status = 409, description = "Command not allowed now", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid body", body = crate::error::ErrorBody),
    )
)]
pub async fn answer_up(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse<AnswerStatsPayload>>, AppError> {
    let request = validated(payload)?;
    let content = answer_service::reveal_answer(&state, game_id, &request.game_secret).await?;
    Ok(Json(CommandResponse::ok(content)))
}

/// Hide the answer statistics.
#[utoipa::path(
    post,
    path = "/manage/answer-down/{game_id}",
    tag = "manage",
    params(("game_id" = i64, Path, description = "Identifier of the game")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Statistics hidden", body = CommandResponse<QuestionRefPayload>),
        (status = 404, description = "Unknown game or wrong secret", body = crate::error::ErrorBody),
        (status = 409, description = "Command not allowed now", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid body", body = crate::error::ErrorBody),
    )
)]
pub async fn answer_down(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse<QuestionRefPayload>>, AppError> {
    let request = validated(payload)?;
    let content = answer_service::hide_answer(&state, game_id, &request.game_secret).await?;
    Ok(Json(CommandResponse::ok(content)))
}

/// Compute winners and reveal the prize split.
#[utoipa::path(
    post,
    path = "/manage/result-up/{game_id}",
    tag = "manage",
    params(("game_id" = i64, Path, description = "Identifier of the game")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Results revealed", body = CommandResponse<ResultPayload>),
        (status = 404, description = "Unknown game or wrong secret", body = crate::error::ErrorBody),
        (status = 409, description = "Command not allowed now", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid body", body = crate::error::ErrorBody),
    )
)]
pub async fn result_up(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse<ResultPayload>>, AppError> {
    let request = validated(payload)?;
    let content = session_service::reveal_result(&state, game_id, &request.game_secret).await?;
    Ok(Json(CommandResponse::ok(content)))
}

/// Hide the results.
#[utoipa::path(
    post,
    path = "/manage/result-down/{game_id}",
    tag = "manage",
    params(("game_id" = i64, Path, description = "Identifier of the game")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Results hidden", body = CommandResponse<SessionView>),
        (status = 404, description = "Unknown game or wrong secret", body = crate::error::ErrorBody),
        (status = 409, description = "Command not allowed now", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid body", body = crate::error::ErrorBody),
    )
)]
pub async fn result_down(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse<SessionView>>, AppError> {
    let request = validated(payload)?;
    let content = session_service::hide_result(&state, game_id, &request.game_secret).await?;
    Ok(Json(CommandResponse::ok(content)))
}

/// Return a finished game to its open state.
#[utoipa::path(
    post,
    path = "/manage/reset/{game_id}",
    tag = "manage",
    params(("game_id" = i64, Path, description = "Identifier of the game")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Game reset", body = CommandResponse<SessionView>),
        (status = 404, description = "Unknown game or wrong secret", body = crate::error::ErrorBody),
        (status = 409, description = "Command not allowed now", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid body", body = crate::error::ErrorBody),
    )
)]
pub async fn reset(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse<SessionView>>, AppError> {
    let request = validated(payload)?;
    let content = session_service::reset(&state, game_id, &request.game_secret).await?;
    Ok(Json(CommandResponse::ok(content)))
}
