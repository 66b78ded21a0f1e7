/// Participant registration, answers and statistics.
pub mod answer_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Question push, retraction and countdown.
pub mod question_service;
/// Session start, stop, results and reset.
pub mod session_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
/// Prize split between winners.
pub mod winner_service;
