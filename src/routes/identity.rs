//! Participant identity supplied by the upstream gateway.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use crate::{dao::models::UserId, error::AppError};

/// Header carrying the pre-authenticated participant id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Pre-validated participant id, read from `x-user-id` or the `userId` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantId(pub UserId);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityQuery {
    user_id: Option<String>,
}

impl<S> FromRequestParts<S> for ParticipantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let raw = match from_header {
            Some(raw) => Some(raw),
            None => Query::<IdentityQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.user_id),
        };

        raw.as_deref()
            .and_then(parse_user_id)
            .map(ParticipantId)
            .ok_or_else(|| AppError::Unauthorized("missing participant identity".into()))
    }
}

fn parse_user_id(raw: &str) -> Option<UserId> {
    raw.trim().parse::<UserId>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<ParticipantId, AppError> {
        let (mut parts, _) = request.into_parts();
        ParticipantId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn header_wins_over_query() {
        let request = Request::builder()
            .uri("/ws?userId=8")
            .header(USER_ID_HEADER, "42")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap(), ParticipantId(42));
    }

    #[tokio::test]
    async fn query_parameter_is_accepted() {
        let request = Request::builder().uri("/ws?userId=8").body(()).unwrap();
        assert_eq!(extract(request).await.unwrap(), ParticipantId(8));
    }

    #[tokio::test]
    async fn missing_or_invalid_identity_is_unauthorized() {
        for uri in ["/ws", "/ws?userId=abc", "/ws?userId=-3"] {
            let request = Request::builder().uri(uri).body(()).unwrap();
            assert!(matches!(
                extract(request).await,
                Err(AppError::Unauthorized(_))
            ));
        }
    }
}
