use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Live Trivia Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::admin::start,
        crate::routes::admin::stop,
        crate::routes::admin::question_up,
        crate::routes::admin::question_down,
        crate::routes::admin::answer_up,
        crate::routes::admin::answer_down,
        crate::routes::admin::result_up,
        crate::routes::admin::result_down,
        crate::routes::admin::reset,
        crate::routes::game::answer_check,
        crate::routes::game::session,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::admin::CommandRequest,
            crate::dto::session::SessionView,
            crate::dto::session::AnswerCheckRequest,
            crate::dto::session::AnswerCheckResponse,
            crate::dto::ws::InboundMessage,
            crate::dto::ws::OutboundEvent,
            crate::error::ErrorBody,
            crate::error::ErrorKind,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "manage", description = "Operator commands driving the live session"),
        (name = "game", description = "Participant HTTP calls"),
        (name = "participants", description = "WebSocket channel for participants"),
    )
)]
pub struct ApiDoc;
