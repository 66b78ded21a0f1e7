use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{
        AbortError, ApplyError, PlanError, session::SessionStateError, snapshot::SnapshotError,
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Stored snapshot could not be decoded or encoded.
    #[error("session snapshot unusable")]
    Snapshot(#[source] SnapshotError),
    /// The snapshot kept changing under a read-modify-write.
    #[error("session snapshot contended after {attempts} attempts")]
    Contention {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// Connection without a pre-validated identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl ServiceError {
    /// Stable error kind exposed to clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidInput(_) => ErrorKind::ValidationError,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::InvalidState(_) => ErrorKind::Conflict,
            ServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            ServiceError::Unavailable(_)
            | ServiceError::Snapshot(_)
            | ServiceError::Contention { .. }
            | ServiceError::Timeout => ErrorKind::InternalError,
        }
    }

    /// Message safe to hand to clients. Internal failures stay generic.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::InvalidInput(message)
            | ServiceError::NotFound(message)
            | ServiceError::InvalidState(message)
            | ServiceError::Unauthorized(message) => message.clone(),
            ServiceError::Timeout => "the operation timed out".into(),
            ServiceError::Unavailable(_)
            | ServiceError::Snapshot(_)
            | ServiceError::Contention { .. } => "internal server error".into(),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<SnapshotError> for ServiceError {
    fn from(err: SnapshotError) -> Self {
        ServiceError::Snapshot(err)
    }
}

impl From<SessionStateError> for ServiceError {
    fn from(err: SessionStateError) -> Self {
        match err {
            SessionStateError::Storage(source) => ServiceError::Unavailable(source),
            SessionStateError::Snapshot(source) => ServiceError::Snapshot(source),
            SessionStateError::Contention { attempts } => ServiceError::Contention { attempts },
        }
    }
}

/// Error kinds clients can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ErrorKind {
    /// Malformed or out-of-range input (422).
    ValidationError,
    /// Unknown game or wrong secret (404).
    NotFound,
    /// Command not allowed in the current state (409).
    Conflict,
    /// Missing identity (401).
    Unauthorized,
    /// Store failure or timeout (500).
    InternalError,
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input failed validation.
    #[error("validation failed: {message}")]
    Validation {
        /// Summary of the failure.
        message: String,
        /// Individual field errors.
        errors: Vec<String>,
    },
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.public_message();
        match err.kind() {
            ErrorKind::ValidationError => AppError::Validation {
                message,
                errors: Vec::new(),
            },
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::Unauthorized => AppError::Unauthorized(message),
            ErrorKind::InternalError => {
                tracing::error!(error = %err, source = ?std::error::Error::source(&err), "command failed");
                AppError::Internal(message)
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        let errors = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(move |failure| match &failure.message {
                    Some(message) => format!("{field}: {message}"),
                    None => format!("{field}: {}", failure.code),
                })
            })
            .collect();
        AppError::Validation {
            message: "Error sending data".into(),
            errors,
        }
    }
}

/// Error envelope returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// HTTP status code.
    pub status: u16,
    /// Human readable reason.
    pub status_text: String,
    /// Error kind.
    pub kind: ErrorKind,
    /// Field errors of a failed validation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl AppError {
    fn parts(self) -> (StatusCode, ErrorBody) {
        let (status, kind, status_text, errors) = match self {
            AppError::Validation { message, errors } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::ValidationError,
                message,
                errors,
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorKind::Unauthorized,
                message,
                Vec::new(),
            ),
            AppError::NotFound(message) => {
                (StatusCode::NOT_FOUND, ErrorKind::NotFound, message, Vec::new())
            }
            AppError::Conflict(message) => {
                (StatusCode::CONFLICT, ErrorKind::Conflict, message, Vec::new())
            }
            AppError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::InternalError,
                message,
                Vec::new(),
            ),
        };
        let body = ErrorBody {
            status: status.as_u16(),
            status_text,
            kind,
            errors,
        };
        (status, body)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = self.parts();
        (status, Json(body)).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("another command is in progress".into())
            }
            PlanError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(invalid.message().into())
            }
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => ServiceError::InvalidState(format!(
                "state changed during transition (expected {expected:?}, got {actual:?})"
            )),
            ApplyError::SessionMismatch => {
                ServiceError::InvalidState("the session changed during the transition".into())
            }
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidState("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("transition plan does not match".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_documented_statuses() {
        let cases = [
            (ServiceError::InvalidInput("bad".into()), 422),
            (ServiceError::NotFound("missing".into()), 404),
            (ServiceError::InvalidState("the game is over".into()), 409),
            (ServiceError::Unauthorized("who".into()), 401),
            (ServiceError::Timeout, 500),
            (ServiceError::Contention { attempts: 3 }, 500),
        ];
        for (err, status) in cases {
            let (code, body) = AppError::from(err).parts();
            assert_eq!(code.as_u16(), status);
            assert_eq!(body.status, status);
        }
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = ServiceError::Unavailable(StorageError::corrupted("bad bson in answers"));
        let (_, body) = AppError::from(err).parts();
        assert_eq!(body.status_text, "internal server error");
        assert_eq!(body.kind, ErrorKind::InternalError);
    }

    #[test]
    fn conflict_keeps_business_message() {
        let (_, body) = AppError::from(ServiceError::InvalidState("the game is over".into())).parts();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": 409, "status_text": "the game is over", "kind": "Conflict"})
        );
    }
}
