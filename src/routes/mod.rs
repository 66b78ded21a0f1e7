use axum::{Json, Router, extract::rejection::JsonRejection};
use validator::Validate;

use crate::{error::AppError, state::SharedState};

pub mod admin;
pub mod docs;
pub mod game;
pub mod health;
pub mod identity;
pub mod websocket;

/// Compose the operator, participant, health and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(admin::router())
        .merge(game::router())
        .merge(websocket::router())
        .merge(docs::router())
        .with_state(state)
}

/// Unwrap a JSON body and run its validation rules, both failing as a 422.
fn validated<T: Validate>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    let Json(body) = payload.map_err(|rejection| AppError::Validation {
        message: "Error sending data".into(),
        errors: vec![rejection.body_text()],
    })?;
    body.validate()?;
    Ok(body)
}
